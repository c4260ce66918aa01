//! Single convergence point for both ingress sources (webhook and poller):
//! claims the idempotency key, then hands the payout to governance.

use std::sync::Arc;

use async_trait::async_trait;
use vyapaar_governance::GovernanceEngine;
use vyapaar_store::AtomicStore;
use vyapaar_types::{GovernanceResult, IngressOutcome, PayoutEntity, Result};

/// Runs after a payout has been evaluated by governance — egress
/// (approve/reject at the provider), notification, audit, and metrics all
/// hang off this single seam so both ingress sources drive the same
/// post-decision behaviour. Never invoked for a duplicate-skipped event.
#[async_trait]
pub trait DecisionSink: Send + Sync
{
  async fn handle(&self, payout: &PayoutEntity, result: &GovernanceResult, vendor_url: Option<&str>);
}

/// Funnels webhook and poll-derived payouts through one idempotency gate
/// before the governance pipeline ever sees them.
pub struct IngressCoordinator
{
  store: Arc<dyn AtomicStore>,
  engine: Arc<GovernanceEngine>,
  sink: Arc<dyn DecisionSink>,
}

impl IngressCoordinator
{
  #[must_use]
  pub fn new(store: Arc<dyn AtomicStore>, engine: Arc<GovernanceEngine>, sink: Arc<dyn DecisionSink>) -> Self
  {
    Self { store, engine, sink }
  }

  /// Claim `idempotency_key`; if this is the first observer, evaluate
  /// `payout` through governance and run the decision sink. Otherwise
  /// returns [`IngressOutcome::DuplicateSkipped`] without touching
  /// governance at all — a replayed webhook or re-polled payout must never
  /// be scored, budgeted, or audited twice.
  pub async fn observe(
    &self,
    payout: &PayoutEntity,
    agent_id: &str,
    vendor_url: Option<&str>,
    idempotency_key: &str,
  ) -> Result<IngressOutcome>
  {
    let is_new = self.store.claim_idempotent(idempotency_key).await?;
    if !is_new
    {
      tracing::debug!(idempotency_key, "skipping already-processed event");
      return Ok(IngressOutcome::DuplicateSkipped { key: idempotency_key.to_string() });
    }

    let result = self.engine.evaluate(payout, agent_id, vendor_url).await?;
    self.sink.handle(payout, &result, vendor_url).await;
    Ok(IngressOutcome::Evaluated(result))
  }
}
