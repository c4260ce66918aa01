//! Redis-backed production `AtomicStore`. Every multi-step operation is a
//! single `redis::Script` invocation, keeping parity with the original's
//! `_BUDGET_LUA` / `_RATE_LIMIT_LUA` (see `redis_client.py`).

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use vyapaar_types::{AgentId, GovernanceError, Result, TransientDependencyError};

use crate::model::{AnomalySample, CachedReputation};
use crate::trait_def::AtomicStore;

const BUDGET_TTL_S: i64 = 90_000; // 25h, covers timezone shift
const IDEMPOTENCY_TTL_S: i64 = 172_800; // 48h
const ANOMALY_HISTORY_CAP: isize = 999; // LTRIM keeps 1000 entries (0..=999)
const ANOMALY_HISTORY_TTL_S: i64 = 604_800; // 7 days

/// Atomically checks `current + amount <= daily_limit`; if so, increments
/// and (re)sets the TTL; returns 1/0.
const BUDGET_LUA: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local amount = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
if current + amount > limit then
  return 0
end
redis.call('INCRBY', KEYS[1], amount)
redis.call('EXPIRE', KEYS[1], ARGV[3])
return 1
";

/// Sliding-window rate limiter over a sorted set of per-call timestamps.
/// Returns `{allowed, count}`.
const RATE_LIMIT_LUA: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local max_requests = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
if count >= max_requests then
  return {0, count}
end
redis.call('ZADD', key, now, tostring(now) .. '-' .. tostring(math.random(1000000)))
redis.call('EXPIRE', key, window + 1)
return {1, count + 1}
";

fn budget_key(agent: &AgentId, today: &str) -> String
{
  format!("vyapaar:budget:{}:{today}", agent.as_str())
}

fn idempotent_key(key: &str) -> String
{
  format!("vyapaar:idempotent:{key}")
}

fn rate_limit_key(agent: &AgentId) -> String
{
  format!("vyapaar:ratelimit:{}", agent.as_str())
}

fn reputation_key(url: &str) -> String
{
  let digest = Sha256::digest(url.as_bytes());
  let hex = hex_prefix(&digest, 16);
  format!("vyapaar:reputation:{hex}")
}

fn anomaly_key(agent: &AgentId) -> String
{
  format!("vyapaar:anomaly:{}", agent.as_str())
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String
{
  let mut s = String::with_capacity(chars);
  for byte in bytes
  {
    if s.len() >= chars
    {
      break;
    }
    s.push_str(&format!("{byte:02x}"));
  }
  s.truncate(chars);
  s
}

fn today_yyyymmdd() -> String
{
  let now = std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs();
  let days = now / 86_400;
  // Proleptic Gregorian conversion from days-since-epoch; avoids a chrono
  // dependency in the hot path for a value only used as a cache-key suffix.
  civil_from_days(days as i64)
}

fn civil_from_days(days: i64) -> String
{
  let z = days + 719_468;
  let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
  let doe = (z - era * 146_097) as u64;
  let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
  let y = yoe as i64 + era * 400;
  let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
  let mp = (5 * doy + 2) / 153;
  let d = doy - (153 * mp + 2) / 5 + 1;
  let m = if mp < 10 { mp + 3 } else { mp - 9 };
  let y = if m <= 2 { y + 1 } else { y };
  format!("{y:04}{m:02}{d:02}")
}

fn now_unix_f64() -> f64
{
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs_f64()
}

fn store_err(detail: impl std::fmt::Display) -> GovernanceError
{
  GovernanceError::Store(detail.to_string())
}

fn dependency_err(detail: impl std::fmt::Display) -> GovernanceError
{
  GovernanceError::Dependency(TransientDependencyError::CallFailed
  {
    dependency: "redis",
    detail: detail.to_string(),
  })
}

/// Production `AtomicStore` backed by a Redis `ConnectionManager`, which
/// transparently reconnects, so one instance is shared for the process
/// lifetime rather than reopened per call.
#[derive(Clone)]
pub struct RedisAtomicStore
{
  conn: ConnectionManager,
}

impl RedisAtomicStore
{
  /// Connect to `redis_url` (e.g. `redis://127.0.0.1:6379`).
  pub async fn connect(redis_url: &str) -> Result<Self>
  {
    let client = redis::Client::open(redis_url).map_err(dependency_err)?;
    let conn = client.get_connection_manager().await.map_err(dependency_err)?;
    Ok(Self { conn })
  }
}

#[async_trait]
impl AtomicStore for RedisAtomicStore
{
  async fn try_spend(&self, agent: &AgentId, amount: i64, daily_limit: i64) -> Result<bool>
  {
    let key = budget_key(agent, &today_yyyymmdd());
    let script = redis::Script::new(BUDGET_LUA);
    let mut conn = self.conn.clone();
    let result: i64 = script
      .key(&key)
      .arg(amount)
      .arg(daily_limit)
      .arg(BUDGET_TTL_S)
      .invoke_async(&mut conn)
      .await
      .map_err(dependency_err)?;
    Ok(result == 1)
  }

  async fn rollback(&self, agent: &AgentId, amount: i64) -> Result<()>
  {
    let key = budget_key(agent, &today_yyyymmdd());
    let mut conn = self.conn.clone();
    let _: i64 = conn.decr(&key, amount).await.map_err(dependency_err)?;
    Ok(())
  }

  async fn read_spend(&self, agent: &AgentId) -> Result<i64>
  {
    let key = budget_key(agent, &today_yyyymmdd());
    let mut conn = self.conn.clone();
    let value: Option<i64> = conn.get(&key).await.map_err(dependency_err)?;
    Ok(value.unwrap_or(0))
  }

  async fn claim_idempotent(&self, key: &str) -> Result<bool>
  {
    let redis_key = idempotent_key(key);
    let mut conn = self.conn.clone();
    let claimed: bool = redis::cmd("SET")
      .arg(&redis_key)
      .arg(1)
      .arg("NX")
      .arg("EX")
      .arg(IDEMPOTENCY_TTL_S)
      .query_async::<Option<String>>(&mut conn)
      .await
      .map_err(dependency_err)?
      .is_some();
    Ok(claimed)
  }

  async fn rate_allow(&self, agent: &AgentId, max: u32, window_s: u64) -> Result<(bool, u32)>
  {
    let key = rate_limit_key(agent);
    let script = redis::Script::new(RATE_LIMIT_LUA);
    let mut conn = self.conn.clone();
    let (allowed, count): (i64, i64) = script
      .key(&key)
      .arg(now_unix_f64())
      .arg(window_s)
      .arg(max)
      .invoke_async(&mut conn)
      .await
      .map_err(dependency_err)?;
    Ok((allowed == 1, count.max(0) as u32))
  }

  async fn reputation_get(&self, url: &str) -> Result<Option<CachedReputation>>
  {
    let key = reputation_key(url);
    let mut conn = self.conn.clone();
    let raw: Option<String> = conn.get(&key).await.map_err(dependency_err)?;
    match raw
    {
      None => Ok(None),
      Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| store_err(e)),
    }
  }

  async fn reputation_put(&self, url: &str, value: CachedReputation, ttl_s: u64) -> Result<()>
  {
    let key = reputation_key(url);
    let json = serde_json::to_string(&value).map_err(|e| store_err(e))?;
    let mut conn = self.conn.clone();
    let _: () = conn.set_ex(&key, json, ttl_s).await.map_err(dependency_err)?;
    Ok(())
  }

  async fn record_anomaly_sample(&self, agent: &AgentId, sample: AnomalySample) -> Result<()>
  {
    let key = anomaly_key(agent);
    let json = serde_json::to_string(&sample).map_err(|e| store_err(e))?;
    let mut conn = self.conn.clone();
    let _: () = conn.lpush(&key, json).await.map_err(dependency_err)?;
    let _: () = conn.ltrim(&key, 0, ANOMALY_HISTORY_CAP).await.map_err(dependency_err)?;
    let _: () = conn.expire(&key, ANOMALY_HISTORY_TTL_S).await.map_err(dependency_err)?;
    Ok(())
  }

  async fn anomaly_history(&self, agent: &AgentId) -> Result<Vec<AnomalySample>>
  {
    let key = anomaly_key(agent);
    let mut conn = self.conn.clone();
    let raw: Vec<String> = conn.lrange(&key, 0, ANOMALY_HISTORY_CAP).await.map_err(dependency_err)?;
    raw
      .into_iter()
      .map(|s| serde_json::from_str(&s).map_err(|e| store_err(e)))
      .collect()
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn budget_key_uses_agent_and_date()
  {
    let agent = AgentId::new("agent_42").unwrap();
    let key = budget_key(&agent, "20260728");
    assert_eq!(key, "vyapaar:budget:agent_42:20260728");
  }

  #[test]
  fn reputation_key_is_a_16_char_hex_prefix()
  {
    let key = reputation_key("https://example.com");
    let hex = key.strip_prefix("vyapaar:reputation:").unwrap();
    assert_eq!(hex.len(), 16);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn civil_date_formats_as_yyyymmdd()
  {
    // 2024-01-01 is day 19723 since epoch.
    assert_eq!(civil_from_days(19_723), "20240101");
  }
}
