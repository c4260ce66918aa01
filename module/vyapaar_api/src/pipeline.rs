//! Binds ingress -> governance -> egress -> notify -> audit into the single
//! `DecisionSink` both the webhook route and the poll tool drive through
//! `IngressCoordinator::observe`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use vyapaar_db::AuditWriter;
use vyapaar_ingress::DecisionSink;
use vyapaar_notify::Notifier;
use vyapaar_provider::PayoutActions;
use vyapaar_store::AtomicStore;
use vyapaar_telemetry::MetricsCollector;
use vyapaar_types::{AuditEntry, Decision, GovernanceResult, PayoutEntity, ReasonCode};

use crate::context::ServerContext;

/// Implements the post-decision data flow, including the two
/// rollback paths: an egress failure on an APPROVED result, and (separately,
/// via the `handle_slack_action` tool) a human REJECT on a previously HELD
/// payout.
pub struct PipelineController
{
  store: Arc<dyn AtomicStore>,
  audit: Arc<AuditWriter>,
  payout_actions: Arc<dyn PayoutActions>,
  chat: Option<Arc<dyn Notifier>>,
  push: Option<Arc<dyn Notifier>>,
  metrics: Arc<MetricsCollector>,
}

impl PipelineController
{
  #[must_use]
  pub fn new(ctx: &ServerContext) -> Self
  {
    Self
    {
      store: ctx.store.clone(),
      audit: ctx.audit.clone(),
      payout_actions: ctx.payout_actions.clone(),
      chat: ctx.chat.clone().map(|c| c as Arc<dyn Notifier>),
      push: ctx.push.clone().map(|p| p as Arc<dyn Notifier>),
      metrics: ctx.metrics.clone(),
    }
  }

  /// Chat first, push on chat failure or absence. Approvals and
  /// non-alertable rejections are handled by each notifier's own `notify`
  /// returning `true` immediately without a network call.
  async fn notify(&self, result: &GovernanceResult, vendor_url: Option<&str>)
  {
    if let Some(chat) = &self.chat
    {
      if chat.notify(result, None, vendor_url).await
      {
        return;
      }
    }
    if let Some(push) = &self.push
    {
      push.notify(result, None, vendor_url).await;
    }
  }

  async fn write_audit(&self, payout: &PayoutEntity, result: &GovernanceResult, vendor_url: Option<&str>)
  {
    let entry = AuditEntry::from_result(result, payout.currency.clone(), None, vendor_url.map(str::to_string), Utc::now());
    self.audit.write(&entry).await;
  }
}

#[async_trait]
impl DecisionSink for PipelineController
{
  async fn handle(&self, payout: &PayoutEntity, result: &GovernanceResult, vendor_url: Option<&str>)
  {
    self.metrics.record_decision(result);

    match result.decision
    {
      Decision::Approved =>
      {
        match self.payout_actions.approve_payout(&payout.id).await
        {
          Ok(_) =>
          {
            self.write_audit(payout, result, vendor_url).await;
            self.notify(result, vendor_url).await;
          }
          Err(err) =>
          {
            tracing::error!(payout_id = %payout.id, error = %err, "egress approve failed after budget commit, rolling back");
            let _ = self.store.rollback(&result.agent_id, result.amount).await;

            let mut demoted = result.clone();
            demoted.decision = Decision::Rejected;
            demoted.reason_code = ReasonCode::InternalError;
            demoted.reason_detail = format!("egress approval failed, payout rolled back: {err}");

            self.write_audit(payout, &demoted, vendor_url).await;
            self.notify(&demoted, vendor_url).await;
          }
        }
      }
      Decision::Rejected =>
      {
        if let Err(err) = self.payout_actions.reject_payout(&payout.id, &result.reason_detail).await
        {
          tracing::error!(payout_id = %payout.id, error = %err, "egress reject call failed, proceeding with recorded decision");
        }
        self.write_audit(payout, result, vendor_url).await;
        self.notify(result, vendor_url).await;
      }
      Decision::Held =>
      {
        // No egress action: the payout stays queued at the provider until a
        // reviewer resolves it via `handle_slack_action`.
        self.write_audit(payout, result, vendor_url).await;
        self.notify(result, vendor_url).await;
      }
    }
  }
}
