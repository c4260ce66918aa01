//! `handle_razorpay_webhook` tool: signature verification, payload bounds,
//! idempotency-gated governance evaluation. Grounded on
//! `ingress/webhook.py`'s request handler.

use serde::Serialize;
use vyapaar_ingress::{parse_event, validate_payload_size, verify_signature};
use vyapaar_types::{Decision, GovernanceError, IngressOutcome, ReasonCode, WebhookValidationError};

use crate::context::ServerContext;
use crate::error::{ApiError, ApiResult};

/// Only this event type is acted upon; anything else is skipped.
const ACTED_EVENT: &str = "payout.queued";

/// Result of handling one webhook delivery.
#[derive(Debug, Serialize)]
pub struct WebhookResponse
{
  pub status: &'static str,
  pub decision: Option<Decision>,
  pub reason_code: Option<ReasonCode>,
  pub reason_detail: Option<String>,
  pub payout_id: Option<String>,
}

impl WebhookResponse
{
  fn from_outcome(outcome: IngressOutcome) -> Self
  {
    match outcome
    {
      IngressOutcome::Evaluated(result) => Self
      {
        status: "evaluated",
        decision: Some(result.decision),
        reason_code: Some(result.reason_code),
        reason_detail: Some(result.reason_detail),
        payout_id: Some(result.payout_id.to_string()),
      },
      IngressOutcome::DuplicateSkipped { key } => Self
      {
        status: "duplicate",
        decision: None,
        reason_code: Some(ReasonCode::IdempotentSkip),
        reason_detail: Some(format!("idempotency key '{key}' already claimed")),
        payout_id: None,
      },
      IngressOutcome::UnsupportedEvent { event } => Self
      {
        status: "unsupported",
        decision: None,
        reason_code: None,
        reason_detail: Some(format!("event '{event}' is not acted upon")),
        payout_id: None,
      },
    }
  }
}

/// Verify `signature` over `body`, parse the payload, and — for
/// `payout.queued` events only — run it through the idempotency-gated
/// governance pipeline. Never mutates store state and never calls egress
/// when signature verification fails.
pub async fn handle(ctx: &ServerContext, body: &[u8], signature: &str) -> ApiResult<WebhookResponse>
{
  validate_payload_size(body).map_err(GovernanceError::from)?;

  if !verify_signature(body, signature, &ctx.settings.razorpay_webhook_secret)
  {
    ctx.metrics.record_webhook(false, false);
    return Err(GovernanceError::from(WebhookValidationError::InvalidSignature).into());
  }

  let parsed = parse_event(body).map_err(GovernanceError::from)?;

  if parsed.event != ACTED_EVENT
  {
    ctx.metrics.record_webhook(true, false);
    return Ok(WebhookResponse::from_outcome(IngressOutcome::UnsupportedEvent { event: parsed.event }));
  }

  let outcome = ctx
    .ingress
    .observe(&parsed.payout, &parsed.agent_id, parsed.vendor_url.as_deref(), &parsed.idempotency_key)
    .await?;

  ctx.metrics.record_webhook(true, matches!(outcome, IngressOutcome::DuplicateSkipped { .. }));

  Ok(WebhookResponse::from_outcome(outcome))
}

#[cfg(test)]
mod tests
{
  use std::sync::Arc;

  use hmac::{Hmac, Mac};
  use sha2::Sha256;
  use vyapaar_anomaly::AnomalyScorer;
  use vyapaar_db::AuditWriter;
  use vyapaar_governance::{GovernanceEngine, RateLimitConfig};
  use vyapaar_ingress::IngressCoordinator;
  use vyapaar_telemetry::MetricsCollector;
  use vyapaar_test_support::{FakeProviderClient, InMemoryAtomicStore, InMemoryRelationalStore};
  use vyapaar_types::AgentPolicy;

  use super::*;
  use crate::pipeline::PipelineController;

  type HmacSha256 = Hmac<Sha256>;

  fn sign(secret: &str, body: &[u8]) -> String
  {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect()
  }

  async fn test_context(secret: &str) -> ServerContext
  {
    let store: Arc<dyn vyapaar_store::AtomicStore> = Arc::new(InMemoryAtomicStore::default());
    let db: Arc<dyn vyapaar_db::RelationalStore> = Arc::new(InMemoryRelationalStore::default());
    db.upsert_agent_policy(&AgentPolicy
    {
      agent_id: vyapaar_types::AgentId::new("agent-1").unwrap(),
      daily_limit: 500_000,
      per_txn_limit: None,
      require_approval_above: None,
      allowed_domains: Vec::new(),
      blocked_domains: Vec::new(),
      created_at: chrono::Utc::now(),
      updated_at: chrono::Utc::now(),
    })
    .await
    .unwrap();

    let url_threat: Arc<dyn vyapaar_reputation::UrlThreatChecker> = Arc::new(AlwaysSafe);
    let engine = Arc::new(GovernanceEngine::new(store.clone(), db.clone(), url_threat.clone(), RateLimitConfig::default()));
    let provider = Arc::new(FakeProviderClient::default());
    let metrics = Arc::new(MetricsCollector::new());
    let audit = Arc::new(AuditWriter::new(db.clone(), "./audit_fallback"));

    let settings = Arc::new(test_settings(secret));

    let partial = ServerContext
    {
      store: store.clone(),
      db: db.clone(),
      engine: engine.clone(),
      payout_actions: provider.clone(),
      payout_source: provider.clone(),
      url_threat,
      legal_entity: Arc::new(NoEntity),
      anomaly: Arc::new(AnomalyScorer::new(store.clone(), 0.75)),
      chat: None,
      push: None,
      audit,
      metrics,
      settings,
      ingress: Arc::new(placeholder_coordinator(store.clone(), engine.clone())),
      breaker_probes: Vec::new(),
    };

    // `IngressCoordinator` needs the pipeline controller as its sink, which
    // itself needs a `&ServerContext` — wire the sink in a second pass.
    let sink = Arc::new(PipelineController::new(&partial));
    ServerContext { ingress: Arc::new(IngressCoordinator::new(store, engine, sink)), ..partial }
  }

  fn placeholder_coordinator(
    store: Arc<dyn vyapaar_store::AtomicStore>,
    engine: Arc<GovernanceEngine>,
  ) -> IngressCoordinator
  {
    struct NoopSink;
    #[async_trait::async_trait]
    impl vyapaar_ingress::DecisionSink for NoopSink
    {
      async fn handle(&self, _: &vyapaar_types::PayoutEntity, _: &vyapaar_types::GovernanceResult, _: Option<&str>) {}
    }
    IngressCoordinator::new(store, engine, Arc::new(NoopSink))
  }

  fn test_settings(secret: &str) -> vyapaar_config::Settings
  {
    let mut vars = std::collections::HashMap::new();
    vars.insert("VYAPAAR_RAZORPAY_KEY_ID".to_string(), "key".to_string());
    vars.insert("VYAPAAR_RAZORPAY_KEY_SECRET".to_string(), "secret".to_string());
    vars.insert("VYAPAAR_RAZORPAY_WEBHOOK_SECRET".to_string(), secret.to_string());
    vars.insert("VYAPAAR_GOOGLE_SAFE_BROWSING_KEY".to_string(), "sbkey".to_string());
    vars.insert("VYAPAAR_POSTGRES_DSN".to_string(), "postgres://localhost/test".to_string());
    vyapaar_config::Settings::from_map(&vars).unwrap()
  }

  struct AlwaysSafe;
  #[async_trait::async_trait]
  impl vyapaar_reputation::UrlThreatChecker for AlwaysSafe
  {
    async fn check(&self, _url: &str) -> vyapaar_reputation::ThreatCheck
    {
      vyapaar_reputation::ThreatCheck { is_safe: true, threat_types: Vec::new() }
    }
  }

  struct NoEntity;
  #[async_trait::async_trait]
  impl vyapaar_reputation::LegalEntityVerifier for NoEntity
  {
    async fn search_by_name(&self, _: &str) -> vyapaar_reputation::EntityLookup
    {
      vyapaar_reputation::EntityLookup::default()
    }
    async fn lookup_lei(&self, _: &str) -> vyapaar_reputation::EntityLookup
    {
      vyapaar_reputation::EntityLookup::default()
    }
  }

  fn body(payout_id: &str) -> Vec<u8>
  {
    format!(
      r#"{{"event":"payout.queued","payload":{{"payout":{{"entity":{{"id":"{payout_id}","amount":1000,"notes":{{"agent_id":"agent-1"}}}}}}}}}}"#
    )
    .into_bytes()
  }

  #[tokio::test]
  async fn rejects_wrong_signature()
  {
    let ctx = test_context("right-secret").await;
    let b = body("pout_1");
    let sig = sign("wrong-secret", &b);
    let err = handle(&ctx, &b, &sig).await.unwrap_err();
    assert!(matches!(err, ApiError::Governance(GovernanceError::Webhook(WebhookValidationError::InvalidSignature))));
  }

  #[tokio::test]
  async fn evaluates_correctly_signed_payout_queued_event()
  {
    let ctx = test_context("right-secret").await;
    let b = body("pout_2");
    let sig = sign("right-secret", &b);
    let response = handle(&ctx, &b, &sig).await.unwrap();
    assert_eq!(response.status, "evaluated");
    assert_eq!(response.decision, Some(Decision::Approved));
  }

  #[tokio::test]
  async fn skips_duplicate_delivery()
  {
    let ctx = test_context("right-secret").await;
    let b = body("pout_3");
    let sig = sign("right-secret", &b);
    handle(&ctx, &b, &sig).await.unwrap();
    let second = handle(&ctx, &b, &sig).await.unwrap();
    assert_eq!(second.status, "duplicate");
  }
}
