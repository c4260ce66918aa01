//! Generic async circuit breaker and retry-with-backoff helper.
//!
//! Every outbound dependency call in the workspace (Razorpay, Safe
//! Browsing, GLEIF, Slack, ntfy) is wrapped in one [`CircuitBreaker`]
//! instance keyed by dependency name. The breaker serialises its own state
//! transitions behind a [`tokio::sync::Mutex`] but always runs the wrapped
//! future outside the lock, so a slow dependency never blocks other
//! callers from observing the breaker's state.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// The three states of the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState
{
  Closed,
  Open,
  HalfOpen,
}

impl fmt::Display for CircuitState
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
  {
    let s = match self
    {
      Self::Closed => "CLOSED",
      Self::Open => "OPEN",
      Self::HalfOpen => "HALF_OPEN",
    };
    write!(f, "{s}")
  }
}

/// Raised instead of invoking the wrapped call while the circuit is OPEN.
#[derive(Debug, Clone)]
pub struct CircuitOpenError
{
  /// Name of the tripped breaker.
  pub name: String,
  /// How long the caller should wait before retrying.
  pub retry_after: Duration,
}

impl fmt::Display for CircuitOpenError
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
  {
    write!(
      f,
      "circuit '{}' is OPEN — retry after {:.1}s",
      self.name,
      self.retry_after.as_secs_f64()
    )
  }
}

impl std::error::Error for CircuitOpenError {}

/// Outcome of a call made through [`CircuitBreaker::call`].
pub enum CallError<E>
{
  /// The circuit was open; the inner call was never attempted.
  Open(CircuitOpenError),
  /// The inner call ran and failed.
  Inner(E),
}

impl<E: fmt::Display> fmt::Display for CallError<E>
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
  {
    match self
    {
      Self::Open(e) => write!(f, "{e}"),
      Self::Inner(e) => write!(f, "{e}"),
    }
  }
}

struct Inner
{
  state: CircuitState,
  failure_count: u32,
  last_failure_at: Option<Instant>,
  half_open_calls: u32,
}

/// Async circuit breaker for a single named external dependency.
pub struct CircuitBreaker
{
  name: String,
  failure_threshold: u32,
  recovery_timeout: Duration,
  half_open_max_calls: u32,
  inner: Mutex<Inner>,
}

impl CircuitBreaker
{
  /// Build a new breaker. `half_open_max_calls` bounds how many probes are
  /// allowed through while recovering (spec default 1).
  #[must_use]
  pub fn new(name: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self
  {
    Self::with_half_open_limit(name, failure_threshold, recovery_timeout, 1)
  }

  /// Build a breaker with an explicit half-open concurrency limit.
  #[must_use]
  pub fn with_half_open_limit(
    name: impl Into<String>,
    failure_threshold: u32,
    recovery_timeout: Duration,
    half_open_max_calls: u32,
  ) -> Self
  {
    Self
    {
      name: name.into(),
      failure_threshold,
      recovery_timeout,
      half_open_max_calls,
      inner: Mutex::new(Inner
      {
        state: CircuitState::Closed,
        failure_count: 0,
        last_failure_at: None,
        half_open_calls: 0,
      }),
    }
  }

  /// Name this breaker was constructed with.
  #[must_use]
  pub fn name(&self) -> &str
  {
    &self.name
  }

  /// Current state, auto-transitioning OPEN → HALF_OPEN once the recovery
  /// timeout has elapsed. Does not mutate stored state; the transition is
  /// observational until the next `call`.
  pub async fn state(&self) -> CircuitState
  {
    let inner = self.inner.lock().await;
    self.observed_state(&inner)
  }

  fn observed_state(&self, inner: &Inner) -> CircuitState
  {
    if inner.state == CircuitState::Open
    {
      if let Some(last) = inner.last_failure_at
      {
        if last.elapsed() >= self.recovery_timeout
        {
          return CircuitState::HalfOpen;
        }
      }
    }
    inner.state
  }

  /// Number of consecutive failures recorded in the current (non-reset) run.
  pub async fn failure_count(&self) -> u32
  {
    self.inner.lock().await.failure_count
  }

  /// Execute `f` through the breaker. Runs the future outside the lock so
  /// no invariant crosses a suspension point under the mutex.
  pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    {
      let mut inner = self.inner.lock().await;
      let observed = self.observed_state(&inner);

      match observed
      {
        CircuitState::Open =>
        {
          let retry_after = inner
            .last_failure_at
            .map(|t| self.recovery_timeout.saturating_sub(t.elapsed()))
            .unwrap_or(self.recovery_timeout);
          return Err(CallError::Open(CircuitOpenError
          {
            name: self.name.clone(),
            retry_after,
          }));
        }
        CircuitState::HalfOpen =>
        {
          if inner.half_open_calls >= self.half_open_max_calls
          {
            return Err(CallError::Open(CircuitOpenError
            {
              name: self.name.clone(),
              retry_after: self.recovery_timeout,
            }));
          }
          inner.state = CircuitState::HalfOpen;
          inner.half_open_calls += 1;
        }
        CircuitState::Closed => {}
      }
    }

    match f().await
    {
      Ok(value) =>
      {
        self.on_success().await;
        Ok(value)
      }
      Err(err) =>
      {
        self.on_failure().await;
        Err(CallError::Inner(err))
      }
    }
  }

  async fn on_success(&self)
  {
    let mut inner = self.inner.lock().await;
    let was_recovering = matches!(inner.state, CircuitState::HalfOpen | CircuitState::Open);
    inner.failure_count = 0;
    inner.half_open_calls = 0;
    inner.state = CircuitState::Closed;
    if was_recovering
    {
      tracing::info!(circuit = %self.name, "circuit closed, dependency recovered");
    }
  }

  async fn on_failure(&self)
  {
    let mut inner = self.inner.lock().await;
    inner.failure_count += 1;
    inner.last_failure_at = Some(Instant::now());
    inner.half_open_calls = 0;

    if inner.failure_count >= self.failure_threshold
    {
      inner.state = CircuitState::Open;
      tracing::warn!(
        circuit = %self.name,
        failures = inner.failure_count,
        recovery_s = self.recovery_timeout.as_secs(),
        "circuit opened"
      );
    }
  }

  /// Forcibly reset the breaker to CLOSED, e.g. from an operator action.
  pub async fn reset(&self)
  {
    let mut inner = self.inner.lock().await;
    inner.state = CircuitState::Closed;
    inner.failure_count = 0;
    inner.half_open_calls = 0;
    inner.last_failure_at = None;
  }

  /// A point-in-time snapshot suitable for the `health_check` tool.
  pub async fn snapshot(&self) -> BreakerSnapshot
  {
    let inner = self.inner.lock().await;
    BreakerSnapshot
    {
      name: self.name.clone(),
      state: self.observed_state(&inner),
      failure_count: inner.failure_count,
      failure_threshold: self.failure_threshold,
      recovery_timeout: self.recovery_timeout,
    }
  }
}

/// Serialisable breaker status for `health_check`.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot
{
  pub name: String,
  pub state: CircuitState,
  pub failure_count: u32,
  pub failure_threshold: u32,
  pub recovery_timeout: Duration,
}

/// Classifies an error as worth retrying (transient/server-side) or not
/// (client error, surfaced immediately). Callers of [`retry_with_backoff`]
/// supply this so the helper stays error-type agnostic.
pub trait Retryable
{
  /// Whether a retry should be attempted for this error.
  fn is_transient(&self) -> bool;
}

/// Retry `f` with exponential backoff: base 1s, multiplier 2, capped at
/// 30s, up to `max_attempts` tries. Only retries errors for which
/// [`Retryable::is_transient`] returns true; any other error (or exhausting
/// the attempt budget) is returned immediately.
pub async fn retry_with_backoff<F, Fut, T, E>(max_attempts: u32, mut f: F) -> Result<T, E>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: Retryable,
{
  const BASE: Duration = Duration::from_secs(1);
  const CAP: Duration = Duration::from_secs(30);

  let mut delay = BASE;
  let mut attempt = 1;
  loop
  {
    match f().await
    {
      Ok(value) => return Ok(value),
      Err(err) if attempt < max_attempts && err.is_transient() =>
      {
        tracing::warn!(attempt, max_attempts, delay_ms = delay.as_millis() as u64, "retrying after transient error");
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(CAP);
        attempt += 1;
      }
      Err(err) => return Err(err),
    }
  }
}

#[cfg(test)]
mod tests
{
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  use super::*;

  #[derive(Debug)]
  struct Boom;

  #[tokio::test]
  async fn opens_after_threshold_failures()
  {
    let cb = CircuitBreaker::new("svc", 3, Duration::from_secs(30));

    for _ in 0..2
    {
      let res: Result<(), CallError<Boom>> = cb.call(|| async { Err(Boom) }).await;
      assert!(matches!(res, Err(CallError::Inner(_))));
      assert_eq!(cb.state().await, CircuitState::Closed);
    }

    let res: Result<(), CallError<Boom>> = cb.call(|| async { Err(Boom) }).await;
    assert!(matches!(res, Err(CallError::Inner(_))));
    assert_eq!(cb.state().await, CircuitState::Open);

    let res: Result<(), CallError<Boom>> = cb.call(|| async { Ok(()) }).await;
    assert!(matches!(res, Err(CallError::Open(_))));
  }

  #[tokio::test]
  async fn half_open_allows_bounded_concurrent_probes()
  {
    let cb = Arc::new(CircuitBreaker::with_half_open_limit(
      "svc",
      1,
      Duration::from_millis(10),
      1,
    ));
    let _: Result<(), CallError<Boom>> = cb.call(|| async { Err(Boom) }).await;
    assert_eq!(cb.state().await, CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cb.state().await, CircuitState::HalfOpen);

    let in_flight = Arc::new(AtomicU32::new(0));
    let max_concurrent = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..5
    {
      let cb = cb.clone();
      let in_flight = in_flight.clone();
      let max_concurrent = max_concurrent.clone();
      handles.push(tokio::spawn(async move {
        let _: Result<(), CallError<Boom>> = cb
          .call(|| async {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_concurrent.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
          })
          .await;
      }));
    }
    for h in handles
    {
      h.await.unwrap();
    }

    assert!(max_concurrent.load(Ordering::SeqCst) <= 1);
  }

  #[tokio::test]
  async fn success_resets_failure_count()
  {
    let cb = CircuitBreaker::new("svc", 3, Duration::from_secs(30));
    let _: Result<(), CallError<Boom>> = cb.call(|| async { Err(Boom) }).await;
    assert_eq!(cb.failure_count().await, 1);
    let _: Result<(), CallError<Boom>> = cb.call(|| async { Ok(()) }).await;
    assert_eq!(cb.failure_count().await, 0);
  }

  #[derive(Debug)]
  struct MaybeTransient(bool);

  impl Retryable for MaybeTransient
  {
    fn is_transient(&self) -> bool
    {
      self.0
    }
  }

  #[tokio::test]
  async fn retry_gives_up_on_non_transient_error()
  {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts2 = attempts.clone();
    let result: Result<(), MaybeTransient> = retry_with_backoff(3, || {
      let attempts = attempts2.clone();
      async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(MaybeTransient(false))
      }
    })
    .await;
    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
  }
}
