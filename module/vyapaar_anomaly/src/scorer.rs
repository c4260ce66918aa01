//! Public anomaly-scoring API: feature extraction, rolling per-agent
//! history via `vyapaar_store`, and training/scoring off the calling
//! task via `spawn_blocking` (isolation forest fitting is CPU-bound).
//! Grounded on `reputation/anomaly.py`'s `TransactionAnomalyScorer`.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use vyapaar_store::{AnomalySample, AtomicStore};
use vyapaar_types::{AgentId, GovernanceError, Result};

use crate::isolation_forest::IsolationForest;

const MIN_TRAINING_SAMPLES: usize = 10;
const N_ESTIMATORS: usize = 100;
const MAX_SAMPLES: usize = 256;
const SEED: u64 = 42;
/// Default `risk_score` cutoff above which a transaction is flagged.
pub const DEFAULT_RISK_THRESHOLD: f64 = 0.75;

/// Feature vector extracted from one transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureVector
{
  pub amount_log: f64,
  pub hour_of_day: f64,
  pub day_of_week: f64,
  pub amount_zscore: f64,
}

/// Result of scoring one transaction for anomaly risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyScore
{
  pub risk_score: f64,
  pub raw_score: f64,
  pub is_anomalous: bool,
  pub features: FeatureVector,
  pub model_trained: bool,
  pub training_samples: usize,
  pub detail: String,
}

/// Aggregate statistics about an agent's historical transactions, for the
/// `get_agent_risk_profile` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRiskProfile
{
  pub agent_id: String,
  pub total_transactions: usize,
  pub mean_paise: i64,
  pub median_paise: i64,
  pub min_paise: i64,
  pub max_paise: i64,
  pub std_paise: i64,
  pub most_active_hour: u32,
  pub hour_distribution: Vec<(u32, u32)>,
}

fn extract_features(amount: i64, ts: DateTime<Utc>) -> FeatureVector
{
  FeatureVector
  {
    amount_log: (amount.max(1) as f64).log10(),
    hour_of_day: f64::from(ts.hour()),
    day_of_week: f64::from(ts.weekday().num_days_from_monday()),
    amount_zscore: 0.0,
  }
}

fn mean(values: &[f64]) -> f64
{
  if values.is_empty()
  {
    return 0.0;
  }
  values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean_value: f64) -> f64
{
  if values.len() <= 1
  {
    return 1.0;
  }
  let variance =
    values.iter().map(|v| (v - mean_value).powi(2)).sum::<f64>() / values.len() as f64;
  variance.sqrt()
}

/// Scores per-agent transactions for anomaly risk, backed by the atomic
/// store's bounded rolling history.
pub struct AnomalyScorer
{
  store: Arc<dyn AtomicStore>,
  risk_threshold: f64,
}

impl AnomalyScorer
{
  #[must_use]
  pub fn new(store: Arc<dyn AtomicStore>, risk_threshold: f64) -> Self
  {
    Self { store, risk_threshold }
  }

  /// Score `amount` for `agent` as of `observed_at`. Always records the
  /// transaction in the agent's rolling history, even when the model isn't
  /// trained yet — this is what builds the history toward the training
  /// floor.
  pub async fn score_transaction(
    &self,
    agent: &AgentId,
    amount: i64,
    observed_at: DateTime<Utc>,
  ) -> Result<AnomalyScore>
  {
    let features = extract_features(amount, observed_at);
    let history = self.store.anomaly_history(agent).await?;

    self
      .store
      .record_anomaly_sample(agent, AnomalySample { amount, observed_at: observed_at.timestamp() })
      .await?;

    if history.len() < MIN_TRAINING_SAMPLES
    {
      return Ok(AnomalyScore
      {
        risk_score: 0.5,
        raw_score: 0.0,
        is_anomalous: false,
        features,
        model_trained: false,
        training_samples: history.len(),
        detail: format!(
          "insufficient data ({}/{MIN_TRAINING_SAMPLES} samples), using neutral score",
          history.len()
        ),
      });
    }

    let logs: Vec<f64> = history
      .iter()
      .map(|s| (s.amount.max(1) as f64).log10())
      .collect();
    let mean_amt = mean(&logs);
    let std_amt = population_std(&logs, mean_amt);

    let mut features = features;
    features.amount_zscore = (features.amount_log - mean_amt) / std_amt.max(0.001);

    let matrix: Vec<Vec<f64>> = history
      .iter()
      .zip(logs.iter())
      .map(|(sample, &log)|
      {
        let ts = DateTime::from_timestamp(sample.observed_at, 0).unwrap_or_else(Utc::now);
        let zscore = (log - mean_amt) / std_amt.max(0.001);
        vec![log, f64::from(ts.hour()), f64::from(ts.weekday().num_days_from_monday()), zscore]
      })
      .collect();

    let point = vec![features.amount_log, features.hour_of_day, features.day_of_week, features.amount_zscore];
    let training_samples = matrix.len();

    let (raw_score, risk_score) = tokio::task::spawn_blocking(move ||
    {
      let forest = IsolationForest::fit(&matrix, N_ESTIMATORS, MAX_SAMPLES, SEED);
      let s = forest.score(&point);
      let raw_score = 0.5 - s;
      let risk_score = (0.5 - raw_score).clamp(0.0, 1.0);
      (raw_score, risk_score)
    })
    .await
    .map_err(|e| GovernanceError::Store(format!("anomaly scoring task panicked: {e}")))?;

    let is_anomalous = risk_score >= self.risk_threshold;
    let detail = if is_anomalous
    {
      let mut contributing = Vec::new();
      if features.amount_zscore.abs() > 2.0
      {
        contributing.push(format!("unusual amount (z={:.1})", features.amount_zscore));
      }
      if features.hour_of_day < 6.0 || features.hour_of_day > 22.0
      {
        contributing.push(format!("unusual hour ({}:00)", features.hour_of_day as u32));
      }
      if contributing.is_empty()
      {
        "anomaly detected: multi-feature deviation".to_string()
      }
      else
      {
        format!("anomaly detected: {}", contributing.join(", "))
      }
    }
    else
    {
      "transaction appears normal".to_string()
    };

    Ok(AnomalyScore { risk_score, raw_score, is_anomalous, features, model_trained: true, training_samples, detail })
  }

  /// Summary statistics over an agent's rolling history.
  pub async fn agent_profile(&self, agent: &AgentId) -> Result<AgentRiskProfile>
  {
    let history = self.store.anomaly_history(agent).await?;
    if history.is_empty()
    {
      return Ok(AgentRiskProfile
      {
        agent_id: agent.as_str().to_string(),
        total_transactions: 0,
        mean_paise: 0,
        median_paise: 0,
        min_paise: 0,
        max_paise: 0,
        std_paise: 0,
        most_active_hour: 0,
        hour_distribution: Vec::new(),
      });
    }

    let mut amounts: Vec<i64> = history.iter().map(|s| s.amount).collect();
    amounts.sort_unstable();
    let n = amounts.len();
    let mean_paise = amounts.iter().sum::<i64>() / n as i64;
    let median_paise = if n % 2 == 0 { (amounts[n / 2 - 1] + amounts[n / 2]) / 2 } else { amounts[n / 2] };
    let min_paise = amounts[0];
    let max_paise = amounts[n - 1];
    let mean_f = mean_paise as f64;
    let variance = amounts.iter().map(|&a| (a as f64 - mean_f).powi(2)).sum::<f64>() / n as f64;
    let std_paise = variance.sqrt() as i64;

    let mut hour_counts = [0u32; 24];
    for sample in &history
    {
      let ts = DateTime::from_timestamp(sample.observed_at, 0).unwrap_or_else(Utc::now);
      hour_counts[ts.hour() as usize] += 1;
    }
    let most_active_hour = hour_counts
      .iter()
      .enumerate()
      .max_by_key(|&(_, count)| count)
      .map(|(hour, _)| hour as u32)
      .unwrap_or(0);
    let hour_distribution =
      hour_counts.iter().enumerate().filter(|&(_, &c)| c > 0).map(|(h, &c)| (h as u32, c)).collect();

    Ok(AgentRiskProfile
    {
      agent_id: agent.as_str().to_string(),
      total_transactions: n,
      mean_paise,
      median_paise,
      min_paise,
      max_paise,
      std_paise,
      most_active_hour,
      hour_distribution,
    })
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn population_std_of_single_value_defaults_to_one()
  {
    assert!((population_std(&[1.0], 1.0) - 1.0).abs() < f64::EPSILON);
  }

  #[test]
  fn feature_extraction_uses_log10_of_amount()
  {
    let ts = DateTime::from_timestamp(0, 0).unwrap();
    let f = extract_features(1000, ts);
    assert!((f.amount_log - 3.0).abs() < 1e-9);
  }
}
