//! Shared error taxonomy.
//!
//! Policy denial and idempotent-skip conditions are deliberately NOT
//! represented here — they are outcomes (`Decision`, `IngressOutcome`),
//! not failures, and are returned as data rather than raised.

use thiserror::Error;

/// Errors raised by constructors and format validators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError
{
  /// A required identifier field was empty or whitespace-only.
  #[error("{field} must not be empty")]
  EmptyId
  {
    /// Name of the offending field.
    field: &'static str,
  },

  /// A monetary amount was negative.
  #[error("amount must be non-negative, got {amount}")]
  NegativeAmount
  {
    /// The rejected amount.
    amount: i64,
  },
}

/// Errors raised when an external dependency cannot complete a call.
///
/// Distinct from [`ValidationError`]: these are retryable/infra failures,
/// not caller mistakes.
#[derive(Debug, Error)]
pub enum TransientDependencyError
{
  /// The dependency returned a 5xx or the connection failed.
  #[error("{dependency} call failed: {detail}")]
  CallFailed
  {
    /// Dependency name, used for breaker keying and logs.
    dependency: &'static str,
    /// Human-readable detail.
    detail: String,
  },

  /// The dependency did not respond within the configured deadline.
  #[error("{dependency} call timed out after {elapsed_ms}ms")]
  Timeout
  {
    /// Dependency name.
    dependency: &'static str,
    /// Elapsed time before giving up.
    elapsed_ms: u64,
  },
}

/// Raised when a webhook payload fails structural or size validation.
/// Surfaced to the caller as a rejected request, never audited as a payout
/// decision — these never reach the governance engine at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebhookValidationError
{
  /// Body was empty.
  #[error("empty webhook payload")]
  Empty,

  /// Body exceeded the 1 MiB ceiling.
  #[error("webhook payload of {size} bytes exceeds the 1 MiB maximum")]
  TooLarge
  {
    /// Observed body size in bytes.
    size: usize,
  },

  /// Body was smaller than the 10 byte floor a well-formed event can have.
  #[error("webhook payload of {size} bytes is too short to be valid")]
  TooShort
  {
    /// Observed body size in bytes.
    size: usize,
  },

  /// Body did not parse as the expected JSON shape.
  #[error("malformed webhook payload: {detail}")]
  Malformed
  {
    /// Parser error detail.
    detail: String,
  },

  /// `X-Razorpay-Signature` did not match the HMAC computed over the body.
  #[error("webhook signature verification failed")]
  InvalidSignature,
}

/// Raised when the audit writer cannot persist an entry to Postgres AND the
/// filesystem fallback also fails. Callers should treat this as fatal for
/// the request (spec requires the decision to still have been made and
/// acted upon — only durability of the record is at risk).
#[derive(Debug, Error)]
#[error("failed to durably record audit entry for payout {payout_id}: {detail}")]
pub struct AuditWriteError
{
  /// The payout whose decision could not be recorded.
  pub payout_id: String,
  /// What went wrong.
  pub detail: String,
}

/// Top-level error returned from component boundaries (store, db,
/// reputation clients, provider bridge).
#[derive(Debug, Error)]
pub enum GovernanceError
{
  /// See [`ValidationError`].
  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// See [`TransientDependencyError`].
  #[error(transparent)]
  Dependency(#[from] TransientDependencyError),

  /// See [`WebhookValidationError`].
  #[error(transparent)]
  Webhook(#[from] WebhookValidationError),

  /// The circuit for a dependency is open; call was not attempted.
  #[error("circuit '{name}' is open, retry after {retry_after_ms}ms")]
  CircuitOpen
  {
    /// Name of the tripped circuit.
    name: String,
    /// Milliseconds until a half-open probe is allowed.
    retry_after_ms: u64,
  },

  /// A Redis or Postgres operation failed.
  #[error("store error: {0}")]
  Store(String),
}

/// Result alias used throughout the workspace's library crates.
pub type Result<T> = core::result::Result<T, GovernanceError>;
