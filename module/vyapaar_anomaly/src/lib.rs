//! Per-agent isolation-forest anomaly scoring over rolling transaction
//! history. Exposed as a standalone tool (`score_transaction_risk`), not a
//! required governance pipeline stage.

mod isolation_forest;
mod scorer;

pub use scorer::{AgentRiskProfile, AnomalyScore, AnomalyScorer, FeatureVector, DEFAULT_RISK_THRESHOLD};
