//! Thin `axum` HTTP surface over the tool layer: the two routes external
//! services actually call synchronously over HTTP (the Razorpay webhook and
//! the Slack interactive callback) plus health/metrics for operators. Every
//! other tool in `crate::tools` is reached through the agent-facing tool-call
//! transport — these routes are the exception because their callers
//! (Razorpay, Slack) speak plain HTTP, not that transport.

mod health;
mod metrics;
mod slack;
mod webhook;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::context::ServerContext;

/// Build the full route table for `vyapaar-governd`.
#[must_use]
pub fn build(ctx: Arc<ServerContext>) -> Router
{
  Router::new()
    .route("/webhooks/razorpay", post(webhook::handle))
    .route("/slack/actions", post(slack::handle))
    .route("/healthz", get(health::handle))
    .route("/metrics", get(metrics::handle))
    .layer(TraceLayer::new_for_http())
    .with_state(ctx)
}
