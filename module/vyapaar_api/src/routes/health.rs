//! `GET /healthz` — thin HTTP wrapper over `crate::tools::health::handle`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::context::ServerContext;
use crate::tools::health;

pub async fn handle(State(ctx): State<Arc<ServerContext>>) -> Json<health::HealthResponse>
{
  Json(health::handle(&ctx).await)
}
