//! `POST /webhooks/razorpay` — thin HTTP wrapper over
//! `crate::tools::webhook::handle`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::context::ServerContext;
use crate::error::ApiError;
use crate::tools::webhook;

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

pub async fn handle(State(ctx): State<Arc<ServerContext>>, headers: HeaderMap, body: axum::body::Bytes) -> Response
{
  let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else
  {
    return ApiError::BadRequest(format!("missing {SIGNATURE_HEADER} header")).into_response();
  };

  match webhook::handle(&ctx, &body, signature).await
  {
    Ok(response) => Json(response).into_response(),
    Err(err) => err.into_response(),
  }
}
