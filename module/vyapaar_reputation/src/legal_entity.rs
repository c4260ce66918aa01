//! GLEIF-style legal entity verification. Grounded on `reputation/gleif.py`:
//! one-hour cache, fail-open (errors return `verified = false` with an
//! `error` field rather than a synthetic rejection), advisory only — never
//! consulted by the governance pipeline's ordered checks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vyapaar_reliability::{BreakerSnapshot, CallError, CircuitBreaker};
use vyapaar_store::{AtomicStore, CachedReputation};

const CACHE_TTL_S: u64 = 3600;

/// One GLEIF legal-entity record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegalEntity
{
  pub lei: String,
  pub legal_name: String,
  pub jurisdiction: String,
  pub entity_status: String,
  pub registration_status: String,
  pub headquarters_country: Option<String>,
}

impl LegalEntity
{
  #[must_use]
  pub fn is_active_and_issued(&self) -> bool
  {
    self.entity_status == "ACTIVE" && self.registration_status == "ISSUED"
  }
}

/// Result of a legal-entity lookup.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntityLookup
{
  pub verified: bool,
  pub best_match: Option<LegalEntity>,
  pub entities: Vec<LegalEntity>,
  pub error: Option<String>,
}

impl EntityLookup
{
  fn from_entities(entities: Vec<LegalEntity>) -> Self
  {
    let best_match = entities
      .iter()
      .find(|e| e.is_active_and_issued())
      .or_else(|| entities.first())
      .cloned();
    let verified = entities.iter().any(LegalEntity::is_active_and_issued);
    Self { verified, best_match, entities, error: None }
  }

  fn error(detail: impl Into<String>) -> Self
  {
    Self { verified: false, best_match: None, entities: Vec::new(), error: Some(detail.into()) }
  }
}

/// Verifies a vendor's legal entity by name or LEI code. Advisory: callers
/// never treat an error or `verified = false` as a rejection.
#[async_trait]
pub trait LegalEntityVerifier: Send + Sync
{
  async fn search_by_name(&self, name: &str) -> EntityLookup;
  async fn lookup_lei(&self, lei: &str) -> EntityLookup;
}

#[derive(Deserialize)]
struct GleifListResponse
{
  #[serde(default)]
  data: Vec<GleifRecord>,
}

#[derive(Deserialize)]
struct GleifSingleResponse
{
  data: GleifRecord,
}

#[derive(Deserialize)]
struct GleifRecord
{
  id: Option<String>,
  attributes: GleifAttributes,
}

#[derive(Deserialize)]
struct GleifAttributes
{
  lei: Option<String>,
  entity: GleifEntity,
  registration: GleifRegistration,
}

#[derive(Deserialize)]
struct GleifEntity
{
  #[serde(rename = "legalName")]
  legal_name: GleifLegalName,
  jurisdiction: Option<String>,
  status: Option<String>,
  #[serde(rename = "headquartersAddress")]
  headquarters_address: Option<GleifAddress>,
}

#[derive(Deserialize)]
struct GleifLegalName
{
  name: Option<String>,
}

#[derive(Deserialize)]
struct GleifAddress
{
  country: Option<String>,
}

#[derive(Deserialize)]
struct GleifRegistration
{
  status: Option<String>,
}

fn record_to_entity(record: GleifRecord) -> LegalEntity
{
  LegalEntity
  {
    lei: record.attributes.lei.or(record.id).unwrap_or_default(),
    legal_name: record.attributes.entity.legal_name.name.unwrap_or_default(),
    jurisdiction: record.attributes.entity.jurisdiction.unwrap_or_default(),
    entity_status: record.attributes.entity.status.unwrap_or_default(),
    registration_status: record.attributes.registration.status.unwrap_or_default(),
    headquarters_country: record.attributes.entity.headquarters_address.and_then(|a| a.country),
  }
}

/// Production client backed by the public GLEIF lookup API.
pub struct GleifClient
{
  http: reqwest::Client,
  api_url: String,
  store: Arc<dyn AtomicStore>,
  breaker: CircuitBreaker,
}

impl GleifClient
{
  #[must_use]
  pub fn new(
    api_url: impl Into<String>,
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
      store,
      breaker: CircuitBreaker::new("gleif", failure_threshold, recovery_timeout),
    }
  }

  /// Breaker state for `health_check`.
  pub async fn breaker_snapshot(&self) -> BreakerSnapshot
  {
    self.breaker.snapshot().await
  }

  async fn call_search(&self, name: &str) -> Result<EntityLookup, String>
  {
    let url = format!("{}?filter[entity.legalName]={}&page[size]=5", self.api_url, urlencode(name));
    let response = self.http.get(&url).send().await.map_err(|e| e.to_string())?;
    if !response.status().is_success()
    {
      return Err(format!("GLEIF API returned {}", response.status()));
    }
    let parsed: GleifListResponse = response.json().await.map_err(|e| e.to_string())?;
    Ok(EntityLookup::from_entities(parsed.data.into_iter().map(record_to_entity).collect()))
  }

  async fn call_lookup_lei(&self, lei: &str) -> Result<EntityLookup, String>
  {
    let url = format!("{}/{}", self.api_url, lei.to_ascii_uppercase());
    let response = self.http.get(&url).send().await.map_err(|e| e.to_string())?;
    if response.status() == reqwest::StatusCode::NOT_FOUND
    {
      return Ok(EntityLookup::error("LEI not found"));
    }
    if !response.status().is_success()
    {
      return Err(format!("GLEIF API returned {}", response.status()));
    }
    let parsed: GleifSingleResponse = response.json().await.map_err(|e| e.to_string())?;
    Ok(EntityLookup::from_entities(vec![record_to_entity(parsed.data)]))
  }
}

fn urlencode(raw: &str) -> String
{
  let mut out = String::with_capacity(raw.len());
  for byte in raw.bytes()
  {
    match byte
    {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
      _ => out.push_str(&format!("%{byte:02X}")),
    }
  }
  out
}

#[async_trait]
impl LegalEntityVerifier for GleifClient
{
  async fn search_by_name(&self, name: &str) -> EntityLookup
  {
    if name.trim().is_empty()
    {
      return EntityLookup::error("empty entity name");
    }
    let cache_key = format!("gleif:name:{}", name.trim().to_lowercase());

    if let Ok(Some(cached)) = self.store.reputation_get(&cache_key).await
    {
      if let Ok(lookup) = serde_json::from_value::<EntityLookup>(cached.payload)
      {
        return lookup;
      }
    }

    let lookup = match self.breaker.call(|| self.call_search(name)).await
    {
      Ok(lookup) => lookup,
      Err(CallError::Open(_)) => EntityLookup::error("GLEIF circuit breaker open"),
      Err(CallError::Inner(detail)) => EntityLookup::error(detail),
    };

    if lookup.error.is_none()
    {
      if let Ok(payload) = serde_json::to_value(&lookup)
      {
        let _ = self.store.reputation_put(&cache_key, CachedReputation { payload }, CACHE_TTL_S).await;
      }
    }
    lookup
  }

  async fn lookup_lei(&self, lei: &str) -> EntityLookup
  {
    if lei.len() != 20
    {
      return EntityLookup::error("invalid LEI (must be 20 characters)");
    }
    let cache_key = format!("gleif:lei:{}", lei.to_ascii_uppercase());

    if let Ok(Some(cached)) = self.store.reputation_get(&cache_key).await
    {
      if let Ok(lookup) = serde_json::from_value::<EntityLookup>(cached.payload)
      {
        return lookup;
      }
    }

    let lookup = match self.breaker.call(|| self.call_lookup_lei(lei)).await
    {
      Ok(lookup) => lookup,
      Err(CallError::Open(_)) => EntityLookup::error("GLEIF circuit breaker open"),
      Err(CallError::Inner(detail)) => EntityLookup::error(detail),
    };

    if lookup.error.is_none()
    {
      if let Ok(payload) = serde_json::to_value(&lookup)
      {
        let _ = self.store.reputation_put(&cache_key, CachedReputation { payload }, CACHE_TTL_S).await;
      }
    }
    lookup
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn verified_requires_active_and_issued()
  {
    let entities = vec![LegalEntity
    {
      lei: "X".into(),
      legal_name: "Acme".into(),
      jurisdiction: "IN".into(),
      entity_status: "ACTIVE".into(),
      registration_status: "LAPSED".into(),
      headquarters_country: None,
    }];
    let lookup = EntityLookup::from_entities(entities);
    assert!(!lookup.verified);
    assert!(lookup.best_match.is_some());
  }

  #[test]
  fn empty_entities_yield_no_best_match()
  {
    let lookup = EntityLookup::from_entities(vec![]);
    assert!(!lookup.verified);
    assert!(lookup.best_match.is_none());
  }
}
