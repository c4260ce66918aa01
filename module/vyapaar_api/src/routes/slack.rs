//! `POST /slack/actions` — the interactive callback Slack's Block Kit
//! buttons post when a reviewer clicks Approve/Reject on a HELD payout.
//! Signature and replay checks happen here, before
//! `crate::tools::slack_action::handle` ever sees the request.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use vyapaar_notify::verify_interactive_signature;

use crate::context::ServerContext;
use crate::error::ApiError;
use crate::tools::slack_action::{self, SlackActionRequest};

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";

pub async fn handle(State(ctx): State<Arc<ServerContext>>, headers: HeaderMap, body: axum::body::Bytes) -> Response
{
  let Some(signing_secret) = ctx.settings.slack_signing_secret.as_deref() else
  {
    return ApiError::BadRequest("chat interactive callbacks are not configured".to_string()).into_response();
  };

  let (Some(timestamp), Some(signature)) = (
    headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok()),
    headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()),
  )
  else
  {
    return ApiError::Unauthorized(format!("missing {TIMESTAMP_HEADER} or {SIGNATURE_HEADER} header")).into_response();
  };

  let body_str = match std::str::from_utf8(&body)
  {
    Ok(s) => s,
    Err(_) => return ApiError::BadRequest("slack callback body is not valid UTF-8".to_string()).into_response(),
  };

  if !verify_interactive_signature(signing_secret, timestamp, body_str, signature, Utc::now().timestamp())
  {
    return ApiError::Unauthorized("invalid or stale slack request signature".to_string()).into_response();
  }

  let request: SlackActionRequest = match serde_json::from_str(body_str)
  {
    Ok(r) => r,
    Err(e) => return ApiError::BadRequest(format!("malformed slack action payload: {e}")).into_response(),
  };

  match slack_action::handle(&ctx, request).await
  {
    Ok(response) => Json(response).into_response(),
    Err(err) => err.into_response(),
  }
}
