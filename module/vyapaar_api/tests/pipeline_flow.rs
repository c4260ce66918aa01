//! End-to-end coverage of the composition root: builds a real
//! `ServerContext` wired from in-memory fakes (the same pattern
//! `tools::webhook`'s unit tests use), mounts it behind the actual `axum`
//! router, and drives requests through `tower::ServiceExt::oneshot` the way
//! a real HTTP client would.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use sha2::Sha256;
use tower::ServiceExt;
use vyapaar_anomaly::AnomalyScorer;
use vyapaar_api::context::ServerContext;
use vyapaar_api::pipeline::PipelineController;
use vyapaar_api::routes;
use vyapaar_config::Settings;
use vyapaar_db::AuditWriter;
use vyapaar_governance::{GovernanceEngine, RateLimitConfig};
use vyapaar_ingress::{DecisionSink, IngressCoordinator};
use vyapaar_reputation::{EntityLookup, LegalEntityVerifier, ThreatCheck, UrlThreatChecker};
use vyapaar_telemetry::MetricsCollector;
use vyapaar_test_support::{FakeProviderClient, InMemoryAtomicStore, InMemoryRelationalStore};
use vyapaar_types::{AgentId, AgentPolicy, GovernanceResult, PayoutEntity};

type HmacSha256 = Hmac<Sha256>;

const WEBHOOK_SECRET: &str = "test-webhook-secret";

fn sign(secret: &str, body: &[u8]) -> String
{
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
  mac.update(body);
  mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect()
}

fn webhook_body(payout_id: &str, amount: i64) -> Vec<u8>
{
  format!(
    r#"{{"event":"payout.queued","payload":{{"payout":{{"entity":{{"id":"{payout_id}","amount":{amount},"notes":{{"agent_id":"agent-1"}}}}}}}}}}"#
  )
  .into_bytes()
}

struct AlwaysSafe;
#[async_trait::async_trait]
impl UrlThreatChecker for AlwaysSafe
{
  async fn check(&self, _url: &str) -> ThreatCheck
  {
    ThreatCheck { is_safe: true, threat_types: Vec::new() }
  }
}

struct NoEntity;
#[async_trait::async_trait]
impl LegalEntityVerifier for NoEntity
{
  async fn search_by_name(&self, _: &str) -> EntityLookup
  {
    EntityLookup::default()
  }
  async fn lookup_lei(&self, _: &str) -> EntityLookup
  {
    EntityLookup::default()
  }
}

struct NoopSink;
#[async_trait::async_trait]
impl DecisionSink for NoopSink
{
  async fn handle(&self, _: &PayoutEntity, _: &GovernanceResult, _: Option<&str>) {}
}

fn test_settings() -> Settings
{
  let mut vars = HashMap::new();
  vars.insert("VYAPAAR_RAZORPAY_KEY_ID".to_string(), "key".to_string());
  vars.insert("VYAPAAR_RAZORPAY_KEY_SECRET".to_string(), "secret".to_string());
  vars.insert("VYAPAAR_RAZORPAY_WEBHOOK_SECRET".to_string(), WEBHOOK_SECRET.to_string());
  vars.insert("VYAPAAR_GOOGLE_SAFE_BROWSING_KEY".to_string(), "sbkey".to_string());
  vars.insert("VYAPAAR_POSTGRES_DSN".to_string(), "postgres://localhost/test".to_string());
  Settings::from_map(&vars).unwrap()
}

async fn test_context() -> Arc<ServerContext>
{
  test_context_with(|_| {}).await
}

async fn test_context_with(configure: impl FnOnce(&mut Settings)) -> Arc<ServerContext>
{
  let store: Arc<dyn vyapaar_store::AtomicStore> = Arc::new(InMemoryAtomicStore::default());
  let db: Arc<dyn vyapaar_db::RelationalStore> = Arc::new(InMemoryRelationalStore::default());
  db.upsert_agent_policy(&AgentPolicy
  {
    agent_id: AgentId::new("agent-1").unwrap(),
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

  let url_threat: Arc<dyn UrlThreatChecker> = Arc::new(AlwaysSafe);
  let engine = Arc::new(GovernanceEngine::new(store.clone(), db.clone(), url_threat.clone(), RateLimitConfig::default()));
  let provider = Arc::new(FakeProviderClient::default());
  let metrics = Arc::new(MetricsCollector::new());
  let audit = Arc::new(AuditWriter::new(db.clone(), "./audit_fallback"));
  let mut settings = test_settings();
  configure(&mut settings);
  let settings = Arc::new(settings);

  let partial = ServerContext
  {
    store: store.clone(),
    db: db.clone(),
    engine: engine.clone(),
    payout_actions: provider.clone(),
    payout_source: provider,
    url_threat,
    legal_entity: Arc::new(NoEntity),
    anomaly: Arc::new(AnomalyScorer::new(store.clone(), 0.75)),
    chat: None,
    push: None,
    audit,
    metrics,
    settings,
    ingress: Arc::new(IngressCoordinator::new(store.clone(), engine.clone(), Arc::new(NoopSink))),
    breaker_probes: Vec::new(),
  };

  let sink = Arc::new(PipelineController::new(&partial));
  Arc::new(ServerContext { ingress: Arc::new(IngressCoordinator::new(store, engine, sink)), ..partial })
}

#[tokio::test]
async fn webhook_route_evaluates_and_deduplicates()
{
  let ctx = test_context().await;
  let app = routes::build(ctx);

  let body = webhook_body("pout_http_1", 1_000);
  let signature = sign(WEBHOOK_SECRET, &body);

  let request = Request::builder()
    .method("POST")
    .uri("/webhooks/razorpay")
    .header("content-type", "application/json")
    .header("x-razorpay-signature", &signature)
    .body(Body::from(body.clone()))
    .unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(json["status"], "evaluated");
  assert_eq!(json["decision"], "APPROVED");

  let duplicate = Request::builder()
    .method("POST")
    .uri("/webhooks/razorpay")
    .header("content-type", "application/json")
    .header("x-razorpay-signature", &signature)
    .body(Body::from(body))
    .unwrap();
  let response = app.oneshot(duplicate).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(json["status"], "duplicate");
}

#[tokio::test]
async fn webhook_route_rejects_bad_signature()
{
  let ctx = test_context().await;
  let app = routes::build(ctx);

  let body = webhook_body("pout_http_2", 1_000);
  let request = Request::builder()
    .method("POST")
    .uri("/webhooks/razorpay")
    .header("content-type", "application/json")
    .header("x-razorpay-signature", "deadbeef")
    .body(Body::from(body))
    .unwrap();
  let response = app.oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_route_requires_signature_header()
{
  let ctx = test_context().await;
  let app = routes::build(ctx);

  let request = Request::builder()
    .method("POST")
    .uri("/webhooks/razorpay")
    .header("content-type", "application/json")
    .body(Body::from(webhook_body("pout_http_3", 1_000)))
    .unwrap();
  let response = app.oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_route_reports_ok()
{
  let ctx = test_context().await;
  let app = routes::build(ctx);

  let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
  let response = app.oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_route_returns_text_exposition()
{
  let ctx = test_context().await;
  let app = routes::build(ctx);

  let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
  let response = app.oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  let text = String::from_utf8(bytes.to_vec()).unwrap();
  assert!(!text.is_empty());
}

#[tokio::test]
async fn slack_route_rejects_missing_signature_headers()
{
  let ctx = test_context_with(|s| s.slack_signing_secret = Some("slack-secret".to_string())).await;
  let app = routes::build(ctx);

  let request = Request::builder()
    .method("POST")
    .uri("/slack/actions")
    .body(Body::from("{}"))
    .unwrap();
  let response = app.oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
