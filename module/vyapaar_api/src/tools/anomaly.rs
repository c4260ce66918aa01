//! `score_transaction_risk` tool over `vyapaar_anomaly::AnomalyScorer`.

use chrono::Utc;
use serde::Deserialize;
use vyapaar_anomaly::AnomalyScore;
use vyapaar_types::{AgentId, GovernanceError, ValidationError};

use crate::context::ServerContext;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct AnomalyRequest
{
  pub agent_id: String,
  pub amount: i64,
}

pub async fn handle(ctx: &ServerContext, req: AnomalyRequest) -> ApiResult<AnomalyScore>
{
  if req.amount < 0
  {
    return Err(GovernanceError::from(ValidationError::NegativeAmount { amount: req.amount }).into());
  }
  let agent = AgentId::new(req.agent_id).map_err(GovernanceError::from)?;
  let score = ctx.anomaly.score_transaction(&agent, req.amount, Utc::now()).await?;
  ctx.metrics.record_anomaly_check(score.is_anomalous, score.model_trained);
  Ok(score)
}
