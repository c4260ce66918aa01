//! `GET /metrics` — text exposition, suitable for direct scraping.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

use crate::context::ServerContext;
use crate::tools::metrics;

pub async fn handle(State(ctx): State<Arc<ServerContext>>) -> impl IntoResponse
{
  metrics::handle(&ctx).text
}
