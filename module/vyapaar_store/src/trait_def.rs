//! The `AtomicStore` trait: every operation the governance pipeline needs
//! to be race-free across concurrent requests.

use async_trait::async_trait;
use vyapaar_types::{AgentId, Result};

use crate::model::{AnomalySample, CachedReputation};

/// Race-free budget, rate-limit, idempotency, reputation-cache and
/// anomaly-history store. Every method is a single atomic operation at the
/// backend (a Lua script for Redis); no method performs an application-level
/// read-modify-write.
#[async_trait]
pub trait AtomicStore: Send + Sync
{
  /// Atomically check-and-increment today's spend for `agent`. Returns
  /// `true` iff `current + amount <= daily_limit`, in which case the spend
  /// has already been committed.
  async fn try_spend(&self, agent: &AgentId, amount: i64, daily_limit: i64) -> Result<bool>;

  /// Unconditionally decrement today's spend for `agent` by `amount`.
  async fn rollback(&self, agent: &AgentId, amount: i64) -> Result<()>;

  /// Non-authoritative read of today's committed spend.
  async fn read_spend(&self, agent: &AgentId) -> Result<i64>;

  /// Claim an idempotency key. `true` iff this is the first observer.
  async fn claim_idempotent(&self, key: &str) -> Result<bool>;

  /// Sliding-window rate check: has `agent` made fewer than `max` calls in
  /// the last `window_s` seconds? Returns `(allowed, current_count)`.
  async fn rate_allow(&self, agent: &AgentId, max: u32, window_s: u64) -> Result<(bool, u32)>;

  /// Fetch a cached reputation lookup result, if present and unexpired.
  async fn reputation_get(&self, url: &str) -> Result<Option<CachedReputation>>;

  /// Cache a reputation lookup result for `ttl_s` seconds.
  async fn reputation_put(&self, url: &str, value: CachedReputation, ttl_s: u64) -> Result<()>;

  /// Append one transaction sample to `agent`'s rolling history.
  async fn record_anomaly_sample(&self, agent: &AgentId, sample: AnomalySample) -> Result<()>;

  /// Fetch `agent`'s rolling transaction history, newest first.
  async fn anomaly_history(&self, agent: &AgentId) -> Result<Vec<AnomalySample>>;
}
