//! `health_check` tool: per-dependency breaker status plus process uptime.

use serde::Serialize;

use crate::context::ServerContext;

#[derive(Debug, Serialize)]
pub struct BreakerHealth
{
  pub name: &'static str,
  pub state: String,
  pub failure_count: u32,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse
{
  pub status: &'static str,
  pub uptime_seconds: u64,
  pub chat_configured: bool,
  pub push_configured: bool,
  pub auto_poll: bool,
  pub breakers: Vec<BreakerHealth>,
}

pub async fn handle(ctx: &ServerContext) -> HealthResponse
{
  let breakers = ctx
    .breaker_snapshots()
    .await
    .into_iter()
    .map(|(name, snapshot)| BreakerHealth { name, state: snapshot.state.to_string(), failure_count: snapshot.failure_count })
    .collect();

  HealthResponse
  {
    status: "ok",
    uptime_seconds: ctx.metrics.uptime_seconds(),
    chat_configured: ctx.chat.is_some(),
    push_configured: ctx.push.is_some(),
    auto_poll: ctx.settings.auto_poll,
    breakers,
  }
}
