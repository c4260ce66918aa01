//! `get_audit_log` tool. Owns the 500-row cap the `RelationalStore` trait
//! deliberately leaves unenforced (see `vyapaar_db::AuditLogFilter`'s doc
//! comment).

use serde::{Deserialize, Serialize};
use vyapaar_db::AuditLogFilter;
use vyapaar_types::{AgentId, AuditEntry, GovernanceError, PayoutId};

use crate::context::ServerContext;
use crate::error::ApiResult;

const MAX_LIMIT: i64 = 500;
const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, Default)]
pub struct AuditLogRequest
{
  pub agent_id: Option<String>,
  pub payout_id: Option<String>,
  pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse
{
  pub entries: Vec<AuditEntry>,
}

pub async fn handle(ctx: &ServerContext, req: AuditLogRequest) -> ApiResult<AuditLogResponse>
{
  let agent_id = req.agent_id.map(AgentId::new).transpose().map_err(GovernanceError::from)?;
  let payout_id = req.payout_id.map(PayoutId::new).transpose().map_err(GovernanceError::from)?;
  let limit = req.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

  let filter = AuditLogFilter { agent_id, payout_id, limit };
  let entries = ctx.db.get_audit_logs(&filter).await?;
  Ok(AuditLogResponse { entries })
}
