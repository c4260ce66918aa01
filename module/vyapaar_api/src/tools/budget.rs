//! `get_agent_budget` tool, combining the policy's `daily_limit` (relational
//! store) with today's non-authoritative spend (atomic store).

use serde::{Deserialize, Serialize};
use vyapaar_types::{AgentId, GovernanceError};

use crate::context::ServerContext;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct BudgetRequest
{
  pub agent_id: String,
}

#[derive(Debug, Serialize)]
pub struct BudgetResponse
{
  pub daily_limit: i64,
  pub spent_today: i64,
  pub remaining: i64,
}

pub async fn handle(ctx: &ServerContext, req: BudgetRequest) -> ApiResult<BudgetResponse>
{
  let agent = AgentId::new(req.agent_id).map_err(GovernanceError::from)?;

  let policy = ctx
    .db
    .get_agent_policy(&agent)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("no policy set for agent '{agent}'")))?;

  let spent_today = ctx.store.read_spend(&agent).await?;
  let remaining = (policy.daily_limit - spent_today).max(0);

  Ok(BudgetResponse { daily_limit: policy.daily_limit, spent_today, remaining })
}
