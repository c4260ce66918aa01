//! Composition root: every cross-cutting collaborator the tool surface and
//! pipeline controller need, built once in `vyapaar-governd`'s `main` and
//! shared as a single `Arc<ServerContext>` — no module-level singletons
//! anywhere in this crate.

use std::sync::Arc;

use async_trait::async_trait;
use vyapaar_anomaly::AnomalyScorer;
use vyapaar_config::Settings;
use vyapaar_db::{AuditWriter, RelationalStore};
use vyapaar_governance::GovernanceEngine;
use vyapaar_ingress::IngressCoordinator;
use vyapaar_notify::{ChatNotifier, PushNotifier};
use vyapaar_provider::{PayoutActions, PayoutSource, RazorpayActions};
use vyapaar_reliability::BreakerSnapshot;
use vyapaar_reputation::{GleifClient, GoogleSafeBrowsingClient, LegalEntityVerifier, UrlThreatChecker};
use vyapaar_store::AtomicStore;
use vyapaar_telemetry::MetricsCollector;

/// Surfaces a production dependency client's circuit breaker for
/// `health_check`, without teaching `PayoutActions`/`UrlThreatChecker`/etc.
/// themselves about breakers. Only the concrete production clients that
/// actually own one implement this; in-memory test fakes simply aren't
/// registered as probes.
#[async_trait]
pub trait BreakerProbe: Send + Sync
{
  async fn snapshot(&self) -> BreakerSnapshot;
}

macro_rules! impl_breaker_probe
{
  ($ty:ty) =>
  {
    #[async_trait]
    impl BreakerProbe for $ty
    {
      async fn snapshot(&self) -> BreakerSnapshot
      {
        self.breaker_snapshot().await
      }
    }
  };
}

impl_breaker_probe!(RazorpayActions);
impl_breaker_probe!(GoogleSafeBrowsingClient);
impl_breaker_probe!(GleifClient);
impl_breaker_probe!(ChatNotifier);
impl_breaker_probe!(PushNotifier);

/// Every collaborator the tool surface and pipeline controller depend on.
/// Constructed once and shared via `Arc<ServerContext>`; every field is
/// `pub` since this struct has no invariants of its own to protect — it is
/// purely a wiring point.
pub struct ServerContext
{
  pub store: Arc<dyn AtomicStore>,
  pub db: Arc<dyn RelationalStore>,
  pub engine: Arc<GovernanceEngine>,
  pub payout_actions: Arc<dyn PayoutActions>,
  pub payout_source: Arc<dyn PayoutSource>,
  pub url_threat: Arc<dyn UrlThreatChecker>,
  pub legal_entity: Arc<dyn LegalEntityVerifier>,
  pub anomaly: Arc<AnomalyScorer>,
  pub chat: Option<Arc<ChatNotifier>>,
  pub push: Option<Arc<PushNotifier>>,
  pub audit: Arc<AuditWriter>,
  pub metrics: Arc<MetricsCollector>,
  pub settings: Arc<Settings>,
  pub ingress: Arc<IngressCoordinator>,
  /// Named breaker-bearing dependency clients, registered separately from
  /// the trait-object fields above so `health_check` can read breaker state
  /// without widening any trait. Empty in tests built from in-memory fakes.
  pub breaker_probes: Vec<(&'static str, Arc<dyn BreakerProbe>)>,
}

impl ServerContext
{
  /// Snapshot every registered breaker, in registration order.
  pub async fn breaker_snapshots(&self) -> Vec<(&'static str, BreakerSnapshot)>
  {
    let mut out = Vec::with_capacity(self.breaker_probes.len());
    for (name, probe) in &self.breaker_probes
    {
      out.push((*name, probe.snapshot().await));
    }
    out
  }
}
