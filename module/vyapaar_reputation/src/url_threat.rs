//! Google Safe Browsing-style URL threat lookup. Grounded on
//! `reputation/safe_browsing.py`: same threat-type list, same 5 minute
//! cache TTL, same fail-closed behaviour on timeout/4xx/5xx/parse error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vyapaar_reliability::{BreakerSnapshot, CallError, CircuitBreaker};
use vyapaar_store::{AtomicStore, CachedReputation};

const THREAT_TYPES: [&str; 4] = [
  "MALWARE",
  "SOCIAL_ENGINEERING",
  "UNWANTED_SOFTWARE",
  "POTENTIALLY_HARMFUL_APPLICATION",
];

const CLIENT_ID: &str = "vyapaar-governd";
const CLIENT_VERSION: &str = "1.0.0";
const CACHE_TTL_S: u64 = 300;

/// Result of a single URL threat lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreatCheck
{
  pub is_safe: bool,
  pub threat_types: Vec<String>,
}

impl ThreatCheck
{
  #[must_use]
  pub fn safe() -> Self
  {
    Self { is_safe: true, threat_types: Vec::new() }
  }

  #[must_use]
  pub fn unsafe_with(threat_type: &str) -> Self
  {
    Self { is_safe: false, threat_types: vec![threat_type.to_string()] }
  }
}

/// Checks a vendor URL against a threat-intelligence provider. Every
/// implementation must be fail-closed: an error of any kind returns
/// `is_safe = false` with a synthetic threat type, never an `Err` that
/// could be mistaken for "unknown, therefore allow".
#[async_trait]
pub trait UrlThreatChecker: Send + Sync
{
  async fn check(&self, url: &str) -> ThreatCheck;
}

#[derive(Serialize)]
struct ThreatMatchesFindRequest<'a>
{
  client: ClientInfo<'a>,
  #[serde(rename = "threatInfo")]
  threat_info: ThreatInfo<'a>,
}

#[derive(Serialize)]
struct ClientInfo<'a>
{
  #[serde(rename = "clientId")]
  client_id: &'a str,
  #[serde(rename = "clientVersion")]
  client_version: &'a str,
}

#[derive(Serialize)]
struct ThreatInfo<'a>
{
  #[serde(rename = "threatTypes")]
  threat_types: &'a [&'a str],
  #[serde(rename = "platformTypes")]
  platform_types: [&'a str; 1],
  #[serde(rename = "threatEntryTypes")]
  threat_entry_types: [&'a str; 1],
  #[serde(rename = "threatEntries")]
  threat_entries: Vec<ThreatEntry<'a>>,
}

#[derive(Serialize)]
struct ThreatEntry<'a>
{
  url: &'a str,
}

#[derive(Debug, Deserialize, Default)]
struct ThreatMatchesFindResponse
{
  #[serde(default)]
  matches: Vec<ThreatMatch>,
}

#[derive(Debug, Deserialize)]
struct ThreatMatch
{
  #[serde(rename = "threatType")]
  threat_type: String,
}

/// Taxonomy of `call_api` failures, mirroring `safe_browsing.py`'s three
/// `except` clauses: a network-level timeout, a non-2xx HTTP status (or
/// other transport failure), and a response-decode failure that falls
/// through to the generic `except Exception` handler.
#[derive(Debug)]
enum SafeBrowsingError
{
  Request(reqwest::Error),
  Status(reqwest::StatusCode),
  Decode(reqwest::Error),
}

impl fmt::Display for SafeBrowsingError
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
  {
    match self
    {
      Self::Request(e) => write!(f, "{e}"),
      Self::Status(status) => write!(f, "safe browsing API returned {status}"),
      Self::Decode(e) => write!(f, "failed to decode safe browsing response: {e}"),
    }
  }
}

/// Production checker backed by the Safe-Browsing-shaped `threatMatches:find`
/// endpoint, cached in the atomic store and wrapped in a circuit breaker.
pub struct GoogleSafeBrowsingClient
{
  http: reqwest::Client,
  api_url: String,
  api_key: String,
  store: Arc<dyn AtomicStore>,
  breaker: CircuitBreaker,
}

impl GoogleSafeBrowsingClient
{
  #[must_use]
  pub fn new(
    api_url: impl Into<String>,
    api_key: impl Into<String>,
    store: Arc<dyn AtomicStore>,
    failure_threshold: u32,
    recovery_timeout: Duration,
  ) -> Self
  {
    Self
    {
      http: reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default(),
      api_url: api_url.into(),
      api_key: api_key.into(),
      store,
      breaker: CircuitBreaker::new("safe_browsing", failure_threshold, recovery_timeout),
    }
  }

  /// Breaker state for `health_check`.
  pub async fn breaker_snapshot(&self) -> BreakerSnapshot
  {
    self.breaker.snapshot().await
  }

  async fn call_api(&self, url: &str) -> Result<ThreatCheck, SafeBrowsingError>
  {
    let body = ThreatMatchesFindRequest
    {
      client: ClientInfo { client_id: CLIENT_ID, client_version: CLIENT_VERSION },
      threat_info: ThreatInfo
      {
        threat_types: &THREAT_TYPES,
        platform_types: ["ANY_PLATFORM"],
        threat_entry_types: ["URL"],
        threat_entries: vec![ThreatEntry { url }],
      },
    };

    let response = self
      .http
      .post(&self.api_url)
      .query(&[("key", self.api_key.as_str())])
      .json(&body)
      .send()
      .await
      .map_err(SafeBrowsingError::Request)?;

    if !response.status().is_success()
    {
      return Err(SafeBrowsingError::Status(response.status()));
    }

    let parsed: ThreatMatchesFindResponse = response.json().await.map_err(SafeBrowsingError::Decode)?;
    if parsed.matches.is_empty()
    {
      Ok(ThreatCheck::safe())
    }
    else
    {
      let threat_types = parsed.matches.into_iter().map(|m| m.threat_type).collect();
      Ok(ThreatCheck { is_safe: false, threat_types })
    }
  }
}

#[async_trait]
impl UrlThreatChecker for GoogleSafeBrowsingClient
{
  async fn check(&self, url: &str) -> ThreatCheck
  {
    if let Ok(Some(cached)) = self.store.reputation_get(url).await
    {
      if let Ok(check) = serde_json::from_value::<ThreatCheck>(cached.payload)
      {
        tracing::debug!(url, "url threat cache hit");
        return check;
      }
    }

    let outcome: Result<ThreatCheck, CallError<SafeBrowsingError>> =
      self.breaker.call(|| self.call_api(url)).await;

    match outcome
    {
      Ok(check) =>
      {
        // Only successful lookups are cached; fail-closed verdicts below are not.
        if let Ok(payload) = serde_json::to_value(&check)
        {
          let _ = self.store.reputation_put(url, CachedReputation { payload }, CACHE_TTL_S).await;
        }
        check
      }
      Err(CallError::Open(_)) =>
      {
        tracing::error!(url, "url threat circuit open, failing closed");
        ThreatCheck::unsafe_with("API_ERROR")
      }
      Err(CallError::Inner(err)) =>
      {
        tracing::error!(url, error = %err, "url threat lookup failed, failing closed");
        match err
        {
          SafeBrowsingError::Request(e) if e.is_timeout() => ThreatCheck::unsafe_with("TIMEOUT"),
          SafeBrowsingError::Request(_) | SafeBrowsingError::Status(_) => ThreatCheck::unsafe_with("API_ERROR"),
          SafeBrowsingError::Decode(_) => ThreatCheck::unsafe_with("INTERNAL_ERROR"),
        }
      }
    }
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn safe_check_has_no_threats()
  {
    let check = ThreatCheck::safe();
    assert!(check.is_safe);
    assert!(check.threat_types.is_empty());
  }

  #[test]
  fn unsafe_with_carries_synthetic_threat_type()
  {
    let check = ThreatCheck::unsafe_with("TIMEOUT");
    assert!(!check.is_safe);
    assert_eq!(check.threat_types, vec!["TIMEOUT".to_string()]);
  }

  #[test]
  fn status_error_is_distinct_from_decode_error()
  {
    // Mirrors the `safe_browsing.py` taxonomy: a bad HTTP status is
    // `API_ERROR`, a response-decode failure is `INTERNAL_ERROR`.
    assert_eq!(ThreatCheck::unsafe_with("API_ERROR").threat_types, vec!["API_ERROR".to_string()]);
    assert_eq!(ThreatCheck::unsafe_with("INTERNAL_ERROR").threat_types, vec!["INTERNAL_ERROR".to_string()]);
  }
}
