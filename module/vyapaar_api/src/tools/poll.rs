//! `poll_razorpay_payouts` tool: one-shot fetch-and-evaluate cycle, distinct
//! from `vyapaar_ingress::PayoutPoller`'s fire-and-forget continuous loop —
//! this variant reports a decision per payout for manual/integration use.

use serde::{Deserialize, Serialize};
use vyapaar_types::{Decision, IngressOutcome, ReasonCode};

use crate::context::ServerContext;
use crate::error::ApiResult;

#[derive(Debug, Deserialize, Default)]
pub struct PollRequest
{
  /// The background poller's provider account number is fixed at
  /// construction; a differing value here is accepted but has no effect,
  /// and is only useful for callers that want to confirm the configured
  /// account.
  pub account_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PollDecision
{
  pub payout_id: String,
  pub decision: Decision,
  pub reason_code: ReasonCode,
  pub reason_detail: String,
}

#[derive(Debug, Serialize)]
pub struct PollResponse
{
  pub total_fetched: usize,
  pub decisions: Vec<PollDecision>,
}

pub async fn handle(ctx: &ServerContext, req: PollRequest) -> ApiResult<PollResponse>
{
  if let Some(account_number) = &req.account_number
  {
    tracing::debug!(account_number, "poll tool invoked with an account_number override, which has no effect");
  }

  let payouts = ctx.payout_source.fetch_all_queued_payouts().await?;
  ctx.metrics.record_poll(payouts.len());

  let mut decisions = Vec::with_capacity(payouts.len());
  for queued in &payouts
  {
    let idempotency_key = format!("poll:payout.queued:{}", queued.payout.id);
    let outcome = ctx
      .ingress
      .observe(&queued.payout, &queued.agent_id, queued.vendor_url.as_deref(), &idempotency_key)
      .await?;

    if let IngressOutcome::Evaluated(result) = outcome
    {
      decisions.push(PollDecision
      {
        payout_id: result.payout_id.to_string(),
        decision: result.decision,
        reason_code: result.reason_code,
        reason_detail: result.reason_detail,
      });
    }
  }

  Ok(PollResponse { total_fetched: payouts.len(), decisions })
}
