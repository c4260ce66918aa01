//! `handle_slack_action` tool: resolves a HELD payout on a reviewer's
//! approve/reject button click. Signature/replay verification happens in
//! `crate::routes` before this is called — by the time this runs, the
//! request is already authenticated.

use serde::{Deserialize, Serialize};
use vyapaar_db::AuditLogFilter;
use vyapaar_types::{Decision, GovernanceError, PayoutId};

use crate::context::ServerContext;
use crate::error::{ApiError, ApiResult};

const ACTION_APPROVE: &str = "approve_payout";
const ACTION_REJECT: &str = "reject_payout";

#[derive(Debug, Deserialize)]
pub struct SlackActionRequest
{
  pub action_id: String,
  pub payout_id: String,
  pub user_name: String,
  #[serde(default)]
  pub channel: Option<String>,
  #[serde(default)]
  pub ts: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SlackActionResponse
{
  pub payout_id: String,
  pub decision: Decision,
}

/// Approve or reject a previously-`HELD` payout per a reviewer's action.
/// Reject triggers the same budget rollback an egress failure would
/// (mirroring the rollback an egress failure would trigger); approve leaves the already-
/// committed budget untouched.
pub async fn handle(ctx: &ServerContext, req: SlackActionRequest) -> ApiResult<SlackActionResponse>
{
  let payout_id = PayoutId::new(req.payout_id).map_err(GovernanceError::from)?;

  let filter = AuditLogFilter { payout_id: Some(payout_id.clone()), agent_id: None, limit: 1 };
  let mut entries = ctx.db.get_audit_logs(&filter).await?;
  let entry = entries.pop().ok_or_else(|| ApiError::NotFound(format!("no audit entry for payout '{payout_id}'")))?;

  if entry.decision != Decision::Held
  {
    return Err(ApiError::BadRequest(format!(
      "payout '{payout_id}' is not pending review (current decision: {})",
      entry.decision
    )));
  }

  let approve = match req.action_id.as_str()
  {
    ACTION_APPROVE => true,
    ACTION_REJECT => false,
    other => return Err(ApiError::BadRequest(format!("unknown action_id '{other}'"))),
  };

  let decision = if approve
  {
    ctx.payout_actions.approve_payout(&payout_id).await?;
    ctx
      .db
      .amend_audit_entry(&payout_id, Decision::Approved, entry.reason_code, &format!("approved by reviewer {}", req.user_name))
      .await?;
    Decision::Approved
  }
  else
  {
    let reason_detail = format!("rejected by reviewer {}", req.user_name);
    ctx.payout_actions.reject_payout(&payout_id, &reason_detail).await?;
    ctx.store.rollback(&entry.agent_id, entry.amount).await?;
    ctx.db.amend_audit_entry(&payout_id, Decision::Rejected, entry.reason_code, &reason_detail).await?;
    Decision::Rejected
  };

  if let (Some(chat), Some(channel), Some(ts)) = (&ctx.chat, &req.channel, &req.ts)
  {
    chat.update_approval_message(channel, ts, payout_id.as_str(), approve, &req.user_name).await;
  }

  Ok(SlackActionResponse { payout_id: payout_id.to_string(), decision })
}

#[cfg(test)]
mod tests
{
    // Exercised end-to-end in `vyapaar_api/tests/pipeline_flow.rs`, which
    // builds a full `ServerContext` with in-memory fakes; unit-testing this
    // function alone would just re-mock every collaborator it already
    // composes.
}
