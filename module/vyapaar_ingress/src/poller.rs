//! Continuous polling ingress: fetches queued payouts on an interval and
//! feeds each new one to the same idempotency-gated pipeline webhooks use.
//! Grounded on `ingress/polling.py::PayoutPoller`.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vyapaar_provider::PayoutSource;

use crate::coordinator::IngressCoordinator;

pub const DEFAULT_POLL_INTERVAL_S: u64 = 30;
pub const MIN_POLL_INTERVAL_S: u64 = 5;
pub const MAX_POLL_INTERVAL_S: u64 = 300;
const ERROR_BACKOFF_BASE_S: f64 = 5.0;
const ERROR_BACKOFF_MAX_S: f64 = 120.0;

/// Clamps a configured poll interval into the supported range.
#[must_use]
pub fn clamp_poll_interval(seconds: u64) -> u64
{
  seconds.clamp(MIN_POLL_INTERVAL_S, MAX_POLL_INTERVAL_S)
}

/// Point-in-time poller statistics, surfaced by the `health_check` tool.
#[derive(Debug, Clone, Copy)]
pub struct PollerStats
{
  pub poll_interval_s: u64,
  pub error_count: u32,
  pub total_processed: u64,
  pub current_backoff_s: f64,
}

/// Drives [`IngressCoordinator::observe`] from a continuous poll loop
/// instead of inbound webhook requests.
pub struct PayoutPoller
{
  source: Arc<dyn PayoutSource>,
  coordinator: Arc<IngressCoordinator>,
  poll_interval_s: u64,
  error_count: AtomicU32,
  total_processed: AtomicU64,
}

impl PayoutPoller
{
  #[must_use]
  pub fn new(source: Arc<dyn PayoutSource>, coordinator: Arc<IngressCoordinator>, poll_interval_s: u64) -> Self
  {
    Self
    {
      source,
      coordinator,
      poll_interval_s: clamp_poll_interval(poll_interval_s),
      error_count: AtomicU32::new(0),
      total_processed: AtomicU64::new(0),
    }
  }

  /// Current statistics snapshot.
  pub fn stats(&self) -> PollerStats
  {
    PollerStats
    {
      poll_interval_s: self.poll_interval_s,
      error_count: self.error_count.load(Ordering::Relaxed),
      total_processed: self.total_processed.load(Ordering::Relaxed),
      current_backoff_s: self.backoff_interval(),
    }
  }

  fn backoff_interval(&self) -> f64
  {
    let errors = self.error_count.load(Ordering::Relaxed);
    if errors == 0
    {
      return self.poll_interval_s as f64;
    }
    (ERROR_BACKOFF_BASE_S * 2f64.powi(errors as i32 - 1)).min(ERROR_BACKOFF_MAX_S)
  }

  /// Execute a single poll cycle: fetch everything queued, feed each
  /// not-yet-seen payout through the coordinator. Never propagates
  /// fetch errors to the caller; they only bump the error/backoff
  /// counter, matching the original's "return [] on exception" behaviour.
  pub async fn poll_once(&self)
  {
    let payouts = match self.source.fetch_all_queued_payouts().await
    {
      Ok(payouts) =>
      {
        self.error_count.store(0, Ordering::Relaxed);
        payouts
      }
      Err(err) =>
      {
        let attempt = self.error_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::error!(attempt, error = %err, "payout poll failed");
        return;
      }
    };

    if payouts.is_empty()
    {
      return;
    }

    let mut new_count = 0usize;
    for queued in payouts
    {
      let idempotency_key = format!("poll:payout.queued:{}", queued.payout.id);
      match self
        .coordinator
        .observe(&queued.payout, &queued.agent_id, queued.vendor_url.as_deref(), &idempotency_key)
        .await
      {
        Ok(outcome) =>
        {
          if !matches!(outcome, vyapaar_types::IngressOutcome::DuplicateSkipped { .. })
          {
            new_count += 1;
            self.total_processed.fetch_add(1, Ordering::Relaxed);
          }
        }
        Err(err) => tracing::error!(payout_id = %queued.payout.id, error = %err, "poll-driven governance evaluation failed"),
      }
    }

    if new_count > 0
    {
      tracing::info!(new_count, "poll found new payouts");
    }
  }

  /// Run `poll_once` in a loop until `cancel` is triggered, sleeping for
  /// the current backoff interval between cycles.
  pub async fn run_continuous(&self, cancel: CancellationToken)
  {
    tracing::info!(interval_s = self.poll_interval_s, "payout poller starting");
    while !cancel.is_cancelled()
    {
      self.poll_once().await;

      let sleep_for = Duration::from_secs_f64(self.backoff_interval());
      tokio::select! {
        () = tokio::time::sleep(sleep_for) => {}
        () = cancel.cancelled() => break,
      }
    }
    tracing::info!(total_processed = self.total_processed.load(Ordering::Relaxed), "payout poller stopped");
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn clamps_below_floor_and_above_ceiling()
  {
    assert_eq!(clamp_poll_interval(1), MIN_POLL_INTERVAL_S);
    assert_eq!(clamp_poll_interval(10_000), MAX_POLL_INTERVAL_S);
  }
}
