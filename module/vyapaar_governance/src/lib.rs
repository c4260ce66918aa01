//! The payout governance decision pipeline: policy lookup, per-transaction
//! and daily budget enforcement, domain gating, vendor threat reputation,
//! and human-approval thresholds.

mod engine;

pub use engine::{GovernanceEngine, RateLimitConfig};
