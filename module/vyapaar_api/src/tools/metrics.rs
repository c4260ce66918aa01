//! `get_metrics` tool: snapshot plus the Prometheus-style text exposition
//! `GET /metrics` also serves directly.

use serde::Serialize;

use crate::context::ServerContext;

#[derive(Debug, Serialize)]
pub struct MetricsResponse
{
  pub uptime_seconds: u64,
  pub text: String,
}

pub fn handle(ctx: &ServerContext) -> MetricsResponse
{
  MetricsResponse { uptime_seconds: ctx.metrics.uptime_seconds(), text: ctx.metrics.render() }
}
