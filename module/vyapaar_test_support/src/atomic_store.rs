//! `DashMap`-backed twin of `vyapaar_store::RedisAtomicStore`, implementing
//! the exact same semantics without a Redis connection, so governance and
//! ingress tests run without external services.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use vyapaar_store::{AnomalySample, AtomicStore, CachedReputation};
use vyapaar_types::{AgentId, Result};

struct RateEntry
{
  timestamps: Vec<Instant>,
}

/// In-memory `AtomicStore`. Every method takes an internal lock only for
/// the duration of its own map access, same race-freedom guarantee the
/// Redis Lua scripts give in production.
#[derive(Default)]
pub struct InMemoryAtomicStore
{
  spend: DashMap<String, i64>,
  idempotency: DashMap<String, Instant>,
  rate_limits: DashMap<String, RateEntry>,
  reputation: DashMap<String, (CachedReputation, Instant, Duration)>,
  anomaly_history: DashMap<String, Vec<AnomalySample>>,
}

impl InMemoryAtomicStore
{
  #[must_use]
  pub fn new() -> Self
  {
    Self::default()
  }
}

#[async_trait]
impl AtomicStore for InMemoryAtomicStore
{
  async fn try_spend(&self, agent: &AgentId, amount: i64, daily_limit: i64) -> Result<bool>
  {
    let mut entry = self.spend.entry(agent.as_str().to_string()).or_insert(0);
    if *entry + amount > daily_limit
    {
      return Ok(false);
    }
    *entry += amount;
    Ok(true)
  }

  async fn rollback(&self, agent: &AgentId, amount: i64) -> Result<()>
  {
    let mut entry = self.spend.entry(agent.as_str().to_string()).or_insert(0);
    *entry -= amount;
    Ok(())
  }

  async fn read_spend(&self, agent: &AgentId) -> Result<i64>
  {
    Ok(self.spend.get(agent.as_str()).map(|v| *v).unwrap_or(0))
  }

  async fn claim_idempotent(&self, key: &str) -> Result<bool>
  {
    use dashmap::mapref::entry::Entry;
    match self.idempotency.entry(key.to_string())
    {
      Entry::Occupied(_) => Ok(false),
      Entry::Vacant(vacant) =>
      {
        vacant.insert(Instant::now());
        Ok(true)
      }
    }
  }

  async fn rate_allow(&self, agent: &AgentId, max: u32, window_s: u64) -> Result<(bool, u32)>
  {
    let window = Duration::from_secs(window_s);
    let now = Instant::now();
    let mut entry = self.rate_limits.entry(agent.as_str().to_string()).or_insert_with(|| RateEntry { timestamps: Vec::new() });
    entry.timestamps.retain(|t| now.duration_since(*t) < window);

    let count = entry.timestamps.len() as u32;
    if count >= max
    {
      return Ok((false, count));
    }
    entry.timestamps.push(now);
    Ok((true, count + 1))
  }

  async fn reputation_get(&self, url: &str) -> Result<Option<CachedReputation>>
  {
    if let Some(entry) = self.reputation.get(url)
    {
      let (value, stored_at, ttl) = entry.value();
      if stored_at.elapsed() < *ttl
      {
        return Ok(Some(value.clone()));
      }
    }
    Ok(None)
  }

  async fn reputation_put(&self, url: &str, value: CachedReputation, ttl_s: u64) -> Result<()>
  {
    self.reputation.insert(url.to_string(), (value, Instant::now(), Duration::from_secs(ttl_s)));
    Ok(())
  }

  async fn record_anomaly_sample(&self, agent: &AgentId, sample: AnomalySample) -> Result<()>
  {
    let mut history = self.anomaly_history.entry(agent.as_str().to_string()).or_default();
    history.insert(0, sample);
    history.truncate(1000);
    Ok(())
  }

  async fn anomaly_history(&self, agent: &AgentId) -> Result<Vec<AnomalySample>>
  {
    Ok(self.anomaly_history.get(agent.as_str()).map(|v| v.clone()).unwrap_or_default())
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[tokio::test]
  async fn try_spend_rejects_amounts_over_the_daily_limit()
  {
    let store = InMemoryAtomicStore::new();
    let agent = AgentId::new("agent-1").unwrap();
    assert!(store.try_spend(&agent, 500, 1000).await.unwrap());
    assert!(!store.try_spend(&agent, 600, 1000).await.unwrap());
    assert_eq!(store.read_spend(&agent).await.unwrap(), 500);
  }

  #[tokio::test]
  async fn rollback_decrements_committed_spend()
  {
    let store = InMemoryAtomicStore::new();
    let agent = AgentId::new("agent-1").unwrap();
    store.try_spend(&agent, 500, 1000).await.unwrap();
    store.rollback(&agent, 500).await.unwrap();
    assert_eq!(store.read_spend(&agent).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn claim_idempotent_only_succeeds_once()
  {
    let store = InMemoryAtomicStore::new();
    assert!(store.claim_idempotent("key").await.unwrap());
    assert!(!store.claim_idempotent("key").await.unwrap());
  }

  #[tokio::test]
  async fn rate_allow_blocks_once_max_is_reached()
  {
    let store = InMemoryAtomicStore::new();
    let agent = AgentId::new("agent-1").unwrap();
    for _ in 0..3
    {
      let (allowed, _) = store.rate_allow(&agent, 3, 60).await.unwrap();
      assert!(allowed);
    }
    let (allowed, count) = store.rate_allow(&agent, 3, 60).await.unwrap();
    assert!(!allowed);
    assert_eq!(count, 3);
  }
}
