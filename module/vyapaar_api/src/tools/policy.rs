//! `set_agent_policy` tool. Upsert is idempotent: `set(p); set(p)` yields
//! the same stored record except `updated_at`.

use chrono::Utc;
use serde::Deserialize;
use vyapaar_types::{AgentId, AgentPolicy, GovernanceError};

use crate::context::ServerContext;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct SetPolicyRequest
{
  pub agent_id: String,
  pub daily_limit: i64,
  #[serde(default)]
  pub per_txn_limit: Option<i64>,
  #[serde(default)]
  pub require_approval_above: Option<i64>,
  #[serde(default)]
  pub allowed_domains: Vec<String>,
  #[serde(default)]
  pub blocked_domains: Vec<String>,
}

pub async fn handle(ctx: &ServerContext, req: SetPolicyRequest) -> ApiResult<AgentPolicy>
{
  if req.daily_limit < 0
  {
    return Err(ApiError::BadRequest(format!("daily_limit must be non-negative, got {}", req.daily_limit)));
  }

  let agent_id = AgentId::new(req.agent_id).map_err(GovernanceError::from)?;
  let now = Utc::now();

  let policy = AgentPolicy
  {
    agent_id,
    daily_limit: req.daily_limit,
    per_txn_limit: req.per_txn_limit,
    require_approval_above: req.require_approval_above,
    allowed_domains: req.allowed_domains,
    blocked_domains: req.blocked_domains,
    created_at: now,
    updated_at: now,
  };

  Ok(ctx.db.upsert_agent_policy(&policy).await?)
}
