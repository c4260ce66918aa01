//! JSON error envelope and HTTP status mapping for the tool surface.
//! Grounded on `iron_control_api::error::ErrorResponse`'s `{error, code,
//! details}` shape, adapted to this crate's tighter formatting.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use vyapaar_types::{GovernanceError, WebhookValidationError};

/// Standard JSON error body returned by every route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse
{
  pub error: String,
  pub code: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
}

/// Errors surfaced by `ServerContext` tool methods and HTTP routes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError
{
  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid request: {0}")]
  BadRequest(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error(transparent)]
  Governance(#[from] GovernanceError),
}

impl ApiError
{
  fn status_and_code(&self) -> (StatusCode, &'static str)
  {
    match self
    {
      Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
      Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
      Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
      Self::Governance(GovernanceError::CircuitOpen { .. }) => (StatusCode::SERVICE_UNAVAILABLE, "CIRCUIT_OPEN"),
      Self::Governance(GovernanceError::Validation(_)) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
      // A wrong webhook signature is an authentication failure, distinct
      // from the other (malformed/oversized) webhook validation failures,
      // which are ordinary bad requests.
      Self::Governance(GovernanceError::Webhook(WebhookValidationError::InvalidSignature)) =>
        (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE"),
      Self::Governance(GovernanceError::Webhook(_)) => (StatusCode::BAD_REQUEST, "WEBHOOK_INVALID"),
      Self::Governance(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
  }
}

impl IntoResponse for ApiError
{
  fn into_response(self) -> Response
  {
    let (status, code) = self.status_and_code();
    let body = ErrorResponse { error: self.to_string(), code: code.to_string(), details: None };
    (status, Json(body)).into_response()
  }
}

/// Result alias for tool methods and route handlers.
pub type ApiResult<T> = Result<T, ApiError>;
