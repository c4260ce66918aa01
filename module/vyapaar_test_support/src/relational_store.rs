//! `DashMap`-backed twin of `vyapaar_db::PostgresStore`.

use async_trait::async_trait;
use dashmap::DashMap;
use vyapaar_db::{AuditLogFilter, RelationalStore};
use vyapaar_types::{AgentId, AgentPolicy, AuditEntry, Decision, PayoutId, ReasonCode, Result};

/// In-memory `RelationalStore`. Audit entries are kept in insertion order
/// and filtered/sorted on read, since the fixture never needs to scale.
#[derive(Default)]
pub struct InMemoryRelationalStore
{
  policies: DashMap<String, AgentPolicy>,
  audit_log: DashMap<String, AuditEntry>,
  audit_order: dashmap::DashMap<String, i64>,
}

impl InMemoryRelationalStore
{
  #[must_use]
  pub fn new() -> Self
  {
    Self::default()
  }
}

#[async_trait]
impl RelationalStore for InMemoryRelationalStore
{
  async fn get_agent_policy(&self, agent: &AgentId) -> Result<Option<AgentPolicy>>
  {
    Ok(self.policies.get(agent.as_str()).map(|v| v.clone()))
  }

  async fn upsert_agent_policy(&self, policy: &AgentPolicy) -> Result<AgentPolicy>
  {
    self.policies.insert(policy.agent_id.as_str().to_string(), policy.clone());
    Ok(policy.clone())
  }

  async fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<bool>
  {
    let key = entry.payout_id.as_str().to_string();
    if self.audit_log.contains_key(&key)
    {
      return Ok(false);
    }
    let seq = self.audit_order.len() as i64;
    self.audit_order.insert(key.clone(), seq);
    self.audit_log.insert(key, entry.clone());
    Ok(true)
  }

  async fn get_audit_logs(&self, filter: &AuditLogFilter) -> Result<Vec<AuditEntry>>
  {
    let mut rows: Vec<(i64, AuditEntry)> = self
      .audit_log
      .iter()
      .filter(|entry| filter.agent_id.as_ref().is_none_or(|a| a == &entry.agent_id))
      .filter(|entry| filter.payout_id.as_ref().is_none_or(|p| p == &entry.payout_id))
      .map(|entry| (*self.audit_order.get(entry.payout_id.as_str()).unwrap(), entry.clone()))
      .collect();

    rows.sort_by(|a, b| b.0.cmp(&a.0));

    let limit = if filter.limit <= 0 { i64::MAX } else { filter.limit };
    Ok(rows.into_iter().take(limit.max(0) as usize).map(|(_, entry)| entry).collect())
  }

  async fn amend_audit_entry(
    &self,
    payout_id: &PayoutId,
    decision: Decision,
    reason_code: ReasonCode,
    reason_detail: &str,
  ) -> Result<bool>
  {
    let Some(mut entry) = self.audit_log.get_mut(payout_id.as_str()) else { return Ok(false) };
    entry.decision = decision;
    entry.reason_code = reason_code;
    entry.reason_detail = reason_detail.to_string();
    Ok(true)
  }
}

#[cfg(test)]
mod tests
{
  use chrono::Utc;
  use vyapaar_types::{Decision, PayoutId, ReasonCode};

  use super::*;

  fn sample_entry(payout_id: &str) -> AuditEntry
  {
    AuditEntry
    {
      payout_id: PayoutId::new(payout_id).unwrap(),
      agent_id: AgentId::new("agent-1").unwrap(),
      amount: 100,
      currency: "INR".to_string(),
      vendor_name: None,
      vendor_url: None,
      decision: Decision::Approved,
      reason_code: ReasonCode::PolicyOk,
      reason_detail: String::new(),
      threat_types: Vec::new(),
      processing_ms: 1,
      created_at: Utc::now(),
    }
  }

  #[tokio::test]
  async fn insert_audit_entry_rejects_duplicate_payout_id()
  {
    let store = InMemoryRelationalStore::new();
    assert!(store.insert_audit_entry(&sample_entry("pout_1")).await.unwrap());
    assert!(!store.insert_audit_entry(&sample_entry("pout_1")).await.unwrap());
  }

  #[tokio::test]
  async fn audit_logs_are_returned_newest_first()
  {
    let store = InMemoryRelationalStore::new();
    store.insert_audit_entry(&sample_entry("pout_1")).await.unwrap();
    store.insert_audit_entry(&sample_entry("pout_2")).await.unwrap();

    let logs = store.get_audit_logs(&AuditLogFilter::default()).await.unwrap();
    assert_eq!(logs[0].payout_id.as_str(), "pout_2");
    assert_eq!(logs[1].payout_id.as_str(), "pout_1");
  }
}
