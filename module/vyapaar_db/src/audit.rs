//! Durable audit writer: primary insert into the relational store, with a
//! filesystem fallback that never raises into the caller. Grounded on
//! `audit/logger.py`'s `log_decision`/`_write_fallback`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vyapaar_types::AuditEntry;

use crate::relational_store::RelationalStore;

/// Writes audit entries, falling back to JSON files under
/// `fallback_dir` if the relational store insert fails.
pub struct AuditWriter
{
  store: Arc<dyn RelationalStore>,
  fallback_dir: PathBuf,
}

impl AuditWriter
{
  #[must_use]
  pub fn new(store: Arc<dyn RelationalStore>, fallback_dir: impl Into<PathBuf>) -> Self
  {
    Self { store, fallback_dir: fallback_dir.into() }
  }

  /// Write `entry`. Never returns an error: a primary-store failure falls
  /// through to the filesystem, and a filesystem failure is only logged.
  pub async fn write(&self, entry: &AuditEntry)
  {
    match self.store.insert_audit_entry(entry).await
    {
      Ok(_inserted) => {}
      Err(err) =>
      {
        tracing::error!(
          payout_id = %entry.payout_id,
          error = %err,
          "audit insert failed, falling back to filesystem"
        );
        self.write_fallback(entry).await;
      }
    }
  }

  async fn write_fallback(&self, entry: &AuditEntry)
  {
    let unix_ms = std::time::SystemTime::now()
      .duration_since(std::time::UNIX_EPOCH)
      .map(|d| d.as_millis())
      .unwrap_or(0);
    let file_name = format!("{}_{unix_ms}.json", entry.payout_id.as_str());
    let path: PathBuf = Path::new(&self.fallback_dir).join(file_name);

    if let Err(err) = self.write_fallback_inner(&path, entry).await
    {
      tracing::error!(path = %path.display(), error = %err, "audit filesystem fallback also failed");
    }
  }

  async fn write_fallback_inner(&self, path: &Path, entry: &AuditEntry) -> std::io::Result<()>
  {
    tokio::fs::create_dir_all(&self.fallback_dir).await?;
    let json = serde_json::to_vec_pretty(entry).unwrap_or_default();
    tokio::fs::write(path, json).await
  }
}

#[cfg(test)]
mod tests
{
  use async_trait::async_trait;
  use chrono::Utc;
  use vyapaar_types::{AgentId, AgentPolicy, Decision, GovernanceError, PayoutId, ReasonCode, Result};

  use super::*;
  use crate::relational_store::AuditLogFilter;

  struct AlwaysFails;

  #[async_trait]
  impl RelationalStore for AlwaysFails
  {
    async fn get_agent_policy(&self, _agent: &AgentId) -> Result<Option<AgentPolicy>>
    {
      Ok(None)
    }

    async fn upsert_agent_policy(&self, _policy: &AgentPolicy) -> Result<AgentPolicy>
    {
      unreachable!()
    }

    async fn insert_audit_entry(&self, _entry: &AuditEntry) -> Result<bool>
    {
      Err(GovernanceError::Store("simulated outage".into()))
    }

    async fn get_audit_logs(&self, _filter: &AuditLogFilter) -> Result<Vec<AuditEntry>>
    {
      Ok(vec![])
    }

    async fn amend_audit_entry(
      &self,
      _payout_id: &PayoutId,
      _decision: Decision,
      _reason_code: ReasonCode,
      _reason_detail: &str,
    ) -> Result<bool>
    {
      Ok(false)
    }
  }

  #[tokio::test]
  async fn falls_back_to_filesystem_on_store_failure()
  {
    let dir = tempfile::tempdir().unwrap();
    let writer = AuditWriter::new(Arc::new(AlwaysFails), dir.path());

    let entry = AuditEntry
    {
      payout_id: PayoutId::new("pout_1").unwrap(),
      agent_id: AgentId::new("agent_1").unwrap(),
      amount: 1000,
      currency: "INR".into(),
      vendor_name: None,
      vendor_url: None,
      decision: Decision::Approved,
      reason_code: ReasonCode::PolicyOk,
      reason_detail: String::new(),
      threat_types: vec![],
      processing_ms: 5,
      created_at: Utc::now(),
    };

    writer.write(&entry).await;

    let mut found = false;
    let mut read_dir = tokio::fs::read_dir(dir.path()).await.unwrap();
    while let Some(file) = read_dir.next_entry().await.unwrap()
    {
      if file.file_name().to_string_lossy().starts_with("pout_1_")
      {
        found = true;
      }
    }
    assert!(found, "expected a fallback file for pout_1");
  }
}
