//! The `RelationalStore` trait: exclusive owner of agent policies and the
//! audit log, as opposed to `vyapaar_store::AtomicStore`'s ownership of
//! budget/rate-limit/idempotency state.

use async_trait::async_trait;
use vyapaar_types::{AgentId, AgentPolicy, AuditEntry, Decision, PayoutId, ReasonCode, Result};

/// Filter for `get_audit_logs`; all fields optional.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter
{
  pub agent_id: Option<AgentId>,
  pub payout_id: Option<PayoutId>,
  /// Capped to 500 by the caller (`vyapaar_api::tools::audit`); this trait
  /// does not enforce the cap itself so test fakes can exercise larger
  /// result sets.
  pub limit: i64,
}

#[async_trait]
pub trait RelationalStore: Send + Sync
{
  /// Fetch the policy for `agent`, if one has been set.
  async fn get_agent_policy(&self, agent: &AgentId) -> Result<Option<AgentPolicy>>;

  /// Insert or replace the policy for `policy.agent_id`.
  async fn upsert_agent_policy(&self, policy: &AgentPolicy) -> Result<AgentPolicy>;

  /// Insert one audit entry. A duplicate `payout_id` is silently ignored
  /// (`ON CONFLICT (payout_id) DO NOTHING`); returns whether a row was
  /// actually inserted.
  async fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<bool>;

  /// Fetch audit entries matching `filter`, newest first.
  async fn get_audit_logs(&self, filter: &AuditLogFilter) -> Result<Vec<AuditEntry>>;

  /// Overwrite the decision/reason of an existing audit row, used when a
  /// human reviewer resolves a HELD payout or egress fails after a budget
  /// commit. Returns whether a row existed and was updated.
  async fn amend_audit_entry(
    &self,
    payout_id: &PayoutId,
    decision: Decision,
    reason_code: ReasonCode,
    reason_detail: &str,
  ) -> Result<bool>;
}
