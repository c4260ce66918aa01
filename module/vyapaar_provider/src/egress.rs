//! Outbound payout actions: approve/reject a queued payout at the provider.
//!
//! Grounded on `egress/razorpay_actions.py`'s `RazorpayActions`: retry with
//! exponential backoff (base 1s, ×2, capped 30s, 3 attempts) on server-side
//! failures only, the whole call wrapped in a circuit breaker.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use vyapaar_reliability::{retry_with_backoff, BreakerSnapshot, CallError, CircuitBreaker, Retryable};
use vyapaar_types::{GovernanceError, PayoutId, Result};

use crate::bridge::ProviderBridge;

const MAX_ATTEMPTS: u32 = 3;

/// An error surfaced by one provider call, classified for the retry helper.
#[derive(Debug)]
struct BridgeCallError
{
  detail: String,
  transient: bool,
}

impl Retryable for BridgeCallError
{
  fn is_transient(&self) -> bool
  {
    self.transient
  }
}

/// Classifies the bridge's stringly-typed error as retryable or not. The
/// bridge protocol surfaces 4xx-equivalent failures prefixed `client_error:`
/// (mirroring `razorpay.errors.BadRequestError`, which the original never
/// retries); everything else is treated as a 5xx/transport failure.
fn classify(detail: String) -> BridgeCallError
{
  let transient = !detail.starts_with("client_error:");
  BridgeCallError { detail, transient }
}

/// Approve/cancel actions against queued payouts at the provider.
#[async_trait]
pub trait PayoutActions: Send + Sync
{
  async fn approve_payout(&self, payout_id: &PayoutId) -> Result<Value>;
  async fn reject_payout(&self, payout_id: &PayoutId, reason: &str) -> Result<Value>;
  /// Cheap reachability probe for `health_check`.
  async fn ping(&self) -> bool;
}

/// Bridge-backed implementation of [`PayoutActions`].
pub struct RazorpayActions
{
  bridge: ProviderBridge,
  circuit: CircuitBreaker,
}

impl RazorpayActions
{
  #[must_use]
  pub fn new(bridge: ProviderBridge) -> Self
  {
    Self { bridge, circuit: CircuitBreaker::new("razorpay", 5, Duration::from_secs(30)) }
  }

  /// Breaker state for `health_check`.
  pub async fn breaker_snapshot(&self) -> BreakerSnapshot
  {
    self.circuit.snapshot().await
  }

  async fn call_with_retry(&self, tool: &str, args: Value) -> Result<Value>
  {
    let outcome = self
      .circuit
      .call(|| retry_with_backoff(MAX_ATTEMPTS, || async { self.bridge.call(tool, args.clone()).await.map_err(classify) }))
      .await;

    match outcome
    {
      Ok(value) => Ok(value),
      Err(CallError::Open(open)) =>
      {
        Err(GovernanceError::CircuitOpen { name: open.name, retry_after_ms: open.retry_after.as_millis() as u64 })
      }
      Err(CallError::Inner(inner)) => Err(GovernanceError::Store(inner.detail)),
    }
  }
}

#[async_trait]
impl PayoutActions for RazorpayActions
{
  async fn approve_payout(&self, payout_id: &PayoutId) -> Result<Value>
  {
    tracing::info!(payout_id = %payout_id, "approving payout");
    self.call_with_retry("payouts.approve", json!({ "payout_id": payout_id.as_str() })).await
  }

  async fn reject_payout(&self, payout_id: &PayoutId, reason: &str) -> Result<Value>
  {
    tracing::info!(payout_id = %payout_id, reason, "rejecting payout");
    self
      .call_with_retry(
        "payouts.cancel",
        json!({ "payout_id": payout_id.as_str(), "remarks": format!("REJECTED by vyapaar governance: {reason}") }),
      )
      .await
  }

  async fn ping(&self) -> bool
  {
    self.bridge.is_healthy().await
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn classifies_client_errors_as_non_transient()
  {
    let err = classify("client_error: payout already processed".to_string());
    assert!(!err.is_transient());

    let err = classify("upstream 503".to_string());
    assert!(err.is_transient());
  }
}
