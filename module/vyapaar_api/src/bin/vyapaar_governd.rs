//! `vyapaar-governd`: the governance server binary. Loads configuration,
//! builds every collaborator once as the composition root, then serves the
//! HTTP surface and (if enabled) the background payout poller until
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vyapaar_anomaly::AnomalyScorer;
use vyapaar_api::context::BreakerProbe;
use vyapaar_api::{routes, PipelineController, ServerContext};
use vyapaar_config::Settings;
use vyapaar_db::{AuditWriter, PostgresStore, RelationalStore};
use vyapaar_governance::{GovernanceEngine, RateLimitConfig};
use vyapaar_ingress::{IngressCoordinator, PayoutPoller};
use vyapaar_notify::{ChatNotifier, PushNotifier};
use vyapaar_provider::{BridgeConfig, PayoutActions, PayoutSource, ProviderBridge, RazorpayActions, RazorpayPayoutSource};
use vyapaar_reputation::{GleifClient, GoogleSafeBrowsingClient, LegalEntityVerifier, UrlThreatChecker};
use vyapaar_store::AtomicStore;
use vyapaar_store::RedisAtomicStore;
use vyapaar_telemetry::{init_logging, LogFormat, MetricsCollector};

const SLACK_API_BASE: &str = "https://slack.com/api";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()>
{
  let _ = dotenvy::dotenv();

  let settings = Settings::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;
  init_logging(&settings.log_level, LogFormat::from_str_lenient(&settings.log_format));

  tracing::info!(host = %settings.host, port = settings.port, "starting vyapaar-governd");

  let settings = Arc::new(settings);

  let store: Arc<dyn AtomicStore> = Arc::new(RedisAtomicStore::connect(&settings.redis_url).await?);
  let db: Arc<dyn RelationalStore> = Arc::new(PostgresStore::connect(&settings.postgres_dsn).await?);

  let breaker_threshold = settings.circuit_breaker_failure_threshold;
  let breaker_timeout = settings.circuit_breaker_recovery_timeout;

  let safe_browsing = Arc::new(GoogleSafeBrowsingClient::new(
    &settings.safe_browsing_api_url,
    &settings.safe_browsing_api_key,
    store.clone(),
    breaker_threshold,
    breaker_timeout,
  ));
  let gleif = Arc::new(GleifClient::new(&settings.gleif_api_url, store.clone(), breaker_threshold, breaker_timeout));

  let url_threat: Arc<dyn UrlThreatChecker> = safe_browsing.clone();
  let legal_entity: Arc<dyn LegalEntityVerifier> = gleif.clone();

  let anomaly = Arc::new(AnomalyScorer::new(store.clone(), settings.anomaly_risk_threshold));

  let bridge_config = BridgeConfig
  {
    binary_path: settings.razorpay_bridge_binary.clone(),
    args: vec!["stdio".to_string()],
    env: vec![
      ("RAZORPAY_KEY_ID".to_string(), settings.razorpay_key_id.clone()),
      ("RAZORPAY_KEY_SECRET".to_string(), settings.razorpay_key_secret.clone()),
    ],
    request_timeout: Duration::from_secs(30),
    queue_capacity: 256,
  };
  let bridge = ProviderBridge::spawn(bridge_config);
  let razorpay_actions = Arc::new(RazorpayActions::new(bridge.clone()));
  let account_number = settings.razorpay_account_number.clone().unwrap_or_default();
  let razorpay_source = Arc::new(RazorpayPayoutSource::new(bridge, account_number));

  let payout_actions: Arc<dyn PayoutActions> = razorpay_actions.clone();
  let payout_source: Arc<dyn PayoutSource> = razorpay_source;

  let chat = match (&settings.slack_bot_token, &settings.slack_channel_id)
  {
    (Some(token), Some(channel)) => Some(Arc::new(ChatNotifier::new(SLACK_API_BASE, token, channel))),
    _ => None,
  };
  let push = settings
    .ntfy_topic
    .as_ref()
    .map(|topic| Arc::new(PushNotifier::new(settings.ntfy_url.clone(), topic.clone(), settings.ntfy_auth_token.as_deref())));

  let metrics = Arc::new(MetricsCollector::new());
  let audit = Arc::new(AuditWriter::new(db.clone(), settings.audit_fallback_dir.clone()));

  let rate_limit = RateLimitConfig { max_requests: settings.rate_limit_max_requests, window_s: settings.rate_limit_window_seconds };
  let engine = Arc::new(GovernanceEngine::new(store.clone(), db.clone(), url_threat.clone(), rate_limit));

  let mut breaker_probes: Vec<(&'static str, Arc<dyn BreakerProbe>)> = vec![
    ("razorpay", razorpay_actions.clone()),
    ("safe_browsing", safe_browsing.clone()),
    ("gleif", gleif.clone()),
  ];
  if let Some(chat) = &chat
  {
    breaker_probes.push(("chat_notifier", chat.clone()));
  }
  if let Some(push) = &push
  {
    breaker_probes.push(("push_notifier", push.clone()));
  }

  let partial = ServerContext
  {
    store: store.clone(),
    db: db.clone(),
    engine: engine.clone(),
    payout_actions,
    payout_source,
    url_threat,
    legal_entity,
    anomaly,
    chat,
    push,
    audit,
    metrics,
    settings: settings.clone(),
    ingress: Arc::new(IngressCoordinator::new(store.clone(), engine.clone(), Arc::new(NoopSink))),
    breaker_probes,
  };
  let sink = Arc::new(PipelineController::new(&partial));
  let ctx = Arc::new(ServerContext { ingress: Arc::new(IngressCoordinator::new(store, engine, sink)), ..partial });

  let poll_cancel = CancellationToken::new();
  let poller_handle = if ctx.settings.auto_poll
  {
    let poller = Arc::new(PayoutPoller::new(
      ctx.payout_source.clone(),
      ctx.ingress.clone(),
      ctx.settings.poll_interval.as_secs(),
    ));
    let cancel = poll_cancel.clone();
    Some(tokio::spawn(async move { poller.run_continuous(cancel).await }))
  }
  else
  {
    None
  };

  let app = routes::build(ctx.clone());
  let addr = format!("{}:{}", ctx.settings.host, ctx.settings.port);
  let listener = tokio::net::TcpListener::bind(&addr).await?;
  tracing::info!(%addr, "vyapaar-governd listening");

  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

  tracing::info!("shutdown signal received, stopping poller");
  poll_cancel.cancel();
  if let Some(handle) = poller_handle
  {
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
  }
  tracing::info!("vyapaar-governd stopped");

  Ok(())
}

async fn shutdown_signal()
{
  let ctrl_c = async {
    tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
  };

  #[cfg(unix)]
  let terminate = async {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
      .expect("failed to install SIGTERM handler")
      .recv()
      .await;
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {}
    () = terminate => {}
  }
}

/// Placeholder sink used only while wiring `IngressCoordinator` before the
/// real `PipelineController` (which itself needs a `&ServerContext`) exists.
struct NoopSink;

#[async_trait::async_trait]
impl vyapaar_ingress::DecisionSink for NoopSink
{
  async fn handle(&self, _: &vyapaar_types::PayoutEntity, _: &vyapaar_types::GovernanceResult, _: Option<&str>) {}
}
