//! `get_agent_risk_profile` tool over `vyapaar_anomaly::AnomalyScorer`.

use serde::Deserialize;
use vyapaar_anomaly::AgentRiskProfile;
use vyapaar_types::{AgentId, GovernanceError};

use crate::context::ServerContext;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct RiskProfileRequest
{
  pub agent_id: String,
}

pub async fn handle(ctx: &ServerContext, req: RiskProfileRequest) -> ApiResult<AgentRiskProfile>
{
  let agent = AgentId::new(req.agent_id).map_err(GovernanceError::from)?;
  Ok(ctx.anomaly.agent_profile(&agent).await?)
}
