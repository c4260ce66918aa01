//! `sqlx::PgPool`-backed `RelationalStore`. Grounded on `db/postgres.py` for
//! exact schema and upsert SQL.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use vyapaar_types::{
  AgentId, AgentPolicy, AuditEntry, Decision, GovernanceError, PayoutId, ReasonCode, Result,
};

use crate::relational_store::{AuditLogFilter, RelationalStore};

fn store_err(detail: impl std::fmt::Display) -> GovernanceError
{
  GovernanceError::Store(detail.to_string())
}

/// Production relational store. One pool is shared for the process
/// lifetime; constructed once in `vyapaar_api`'s composition root.
#[derive(Clone)]
pub struct PostgresStore
{
  pool: PgPool,
}

impl PostgresStore
{
  /// Connect and run embedded migrations.
  pub async fn connect(dsn: &str) -> Result<Self>
  {
    let pool = PgPool::connect(dsn).await.map_err(store_err)?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(store_err)?;
    Ok(Self { pool })
  }

  /// Wrap an already-connected pool (tests, or a pool shared with another
  /// crate in the same process).
  #[must_use]
  pub fn from_pool(pool: PgPool) -> Self
  {
    Self { pool }
  }
}

#[async_trait]
impl RelationalStore for PostgresStore
{
  async fn get_agent_policy(&self, agent: &AgentId) -> Result<Option<AgentPolicy>>
  {
    let row = sqlx::query_as::<_, PolicyRow>(
      r"
      SELECT agent_id, daily_limit, per_txn_limit, require_approval_above,
             allowed_domains, blocked_domains, created_at, updated_at
      FROM agent_policies WHERE agent_id = $1
      ",
    )
    .bind(agent.as_str())
    .fetch_optional(&self.pool)
    .await
    .map_err(store_err)?;

    row.map(PolicyRow::try_into).transpose()
  }

  async fn upsert_agent_policy(&self, policy: &AgentPolicy) -> Result<AgentPolicy>
  {
    let row = sqlx::query_as::<_, PolicyRow>(
      r"
      INSERT INTO agent_policies
        (agent_id, daily_limit, per_txn_limit, require_approval_above,
         allowed_domains, blocked_domains, created_at, updated_at)
      VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
      ON CONFLICT (agent_id) DO UPDATE SET
        daily_limit = EXCLUDED.daily_limit,
        per_txn_limit = EXCLUDED.per_txn_limit,
        require_approval_above = EXCLUDED.require_approval_above,
        allowed_domains = EXCLUDED.allowed_domains,
        blocked_domains = EXCLUDED.blocked_domains,
        updated_at = NOW()
      RETURNING agent_id, daily_limit, per_txn_limit, require_approval_above,
                allowed_domains, blocked_domains, created_at, updated_at
      ",
    )
    .bind(policy.agent_id.as_str())
    .bind(policy.daily_limit)
    .bind(policy.per_txn_limit)
    .bind(policy.require_approval_above)
    .bind(&policy.allowed_domains)
    .bind(&policy.blocked_domains)
    .fetch_one(&self.pool)
    .await
    .map_err(store_err)?;

    row.try_into()
  }

  async fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<bool>
  {
    let result = sqlx::query(
      r"
      INSERT INTO audit_logs
        (payout_id, agent_id, amount, currency, vendor_name, vendor_url,
         decision, reason_code, reason_detail, threat_types, processing_ms, created_at)
      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
      ON CONFLICT (payout_id) DO NOTHING
      ",
    )
    .bind(entry.payout_id.as_str())
    .bind(entry.agent_id.as_str())
    .bind(entry.amount)
    .bind(&entry.currency)
    .bind(&entry.vendor_name)
    .bind(&entry.vendor_url)
    .bind(entry.decision.as_str())
    .bind(entry.reason_code.as_str())
    .bind(&entry.reason_detail)
    .bind(&entry.threat_types)
    .bind(i32::try_from(entry.processing_ms).unwrap_or(i32::MAX))
    .bind(entry.created_at)
    .execute(&self.pool)
    .await
    .map_err(store_err)?;

    Ok(result.rows_affected() > 0)
  }

  async fn get_audit_logs(&self, filter: &AuditLogFilter) -> Result<Vec<AuditEntry>>
  {
    let rows = sqlx::query_as::<_, AuditRow>(
      r"
      SELECT payout_id, agent_id, amount, currency, vendor_name, vendor_url,
             decision, reason_code, reason_detail, threat_types, processing_ms, created_at
      FROM audit_logs
      WHERE ($1::TEXT IS NULL OR agent_id = $1)
        AND ($2::TEXT IS NULL OR payout_id = $2)
      ORDER BY created_at DESC
      LIMIT $3
      ",
    )
    .bind(filter.agent_id.as_ref().map(AgentId::as_str))
    .bind(filter.payout_id.as_ref().map(PayoutId::as_str))
    .bind(filter.limit)
    .fetch_all(&self.pool)
    .await
    .map_err(store_err)?;

    rows.into_iter().map(AuditRow::try_into).collect()
  }

  async fn amend_audit_entry(
    &self,
    payout_id: &PayoutId,
    decision: Decision,
    reason_code: ReasonCode,
    reason_detail: &str,
  ) -> Result<bool>
  {
    let result = sqlx::query(
      r"
      UPDATE audit_logs
      SET decision = $1, reason_code = $2, reason_detail = $3
      WHERE payout_id = $4
      ",
    )
    .bind(decision.as_str())
    .bind(reason_code.as_str())
    .bind(reason_detail)
    .bind(payout_id.as_str())
    .execute(&self.pool)
    .await
    .map_err(store_err)?;

    Ok(result.rows_affected() > 0)
  }
}

#[derive(sqlx::FromRow)]
struct PolicyRow
{
  agent_id: String,
  daily_limit: i64,
  per_txn_limit: Option<i64>,
  require_approval_above: Option<i64>,
  allowed_domains: Vec<String>,
  blocked_domains: Vec<String>,
  created_at: chrono::DateTime<Utc>,
  updated_at: chrono::DateTime<Utc>,
}

impl TryFrom<PolicyRow> for AgentPolicy
{
  type Error = GovernanceError;

  fn try_from(row: PolicyRow) -> Result<Self>
  {
    Ok(Self
    {
      agent_id: AgentId::new(row.agent_id).map_err(GovernanceError::Validation)?,
      daily_limit: row.daily_limit,
      per_txn_limit: row.per_txn_limit,
      require_approval_above: row.require_approval_above,
      allowed_domains: row.allowed_domains,
      blocked_domains: row.blocked_domains,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(sqlx::FromRow)]
struct AuditRow
{
  payout_id: String,
  agent_id: String,
  amount: i64,
  currency: String,
  vendor_name: Option<String>,
  vendor_url: Option<String>,
  decision: String,
  reason_code: String,
  reason_detail: Option<String>,
  threat_types: Vec<String>,
  processing_ms: Option<i32>,
  created_at: chrono::DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry
{
  type Error = GovernanceError;

  fn try_from(row: AuditRow) -> Result<Self>
  {
    Ok(Self
    {
      payout_id: PayoutId::new(row.payout_id).map_err(GovernanceError::Validation)?,
      agent_id: AgentId::new(row.agent_id).map_err(GovernanceError::Validation)?,
      amount: row.amount,
      currency: row.currency,
      vendor_name: row.vendor_name,
      vendor_url: row.vendor_url,
      decision: decision_from_str(&row.decision)?,
      reason_code: reason_code_from_str(&row.reason_code)?,
      reason_detail: row.reason_detail.unwrap_or_default(),
      threat_types: row.threat_types,
      processing_ms: row.processing_ms.unwrap_or(0).max(0) as u64,
      created_at: row.created_at,
    })
  }
}

fn decision_from_str(s: &str) -> Result<Decision>
{
  match s
  {
    "APPROVED" => Ok(Decision::Approved),
    "REJECTED" => Ok(Decision::Rejected),
    "HELD" => Ok(Decision::Held),
    other => Err(store_err(format!("unknown decision in audit_logs row: {other}"))),
  }
}

fn reason_code_from_str(s: &str) -> Result<ReasonCode>
{
  match s
  {
    "POLICY_OK" => Ok(ReasonCode::PolicyOk),
    "INVALID_SIGNATURE" => Ok(ReasonCode::InvalidSignature),
    "IDEMPOTENT_SKIP" => Ok(ReasonCode::IdempotentSkip),
    "NO_POLICY" => Ok(ReasonCode::NoPolicy),
    "TXN_LIMIT_EXCEEDED" => Ok(ReasonCode::TxnLimitExceeded),
    "RATE_LIMITED" => Ok(ReasonCode::RateLimited),
    "LIMIT_EXCEEDED" => Ok(ReasonCode::LimitExceeded),
    "DOMAIN_BLOCKED" => Ok(ReasonCode::DomainBlocked),
    "RISK_HIGH" => Ok(ReasonCode::RiskHigh),
    "APPROVAL_REQUIRED" => Ok(ReasonCode::ApprovalRequired),
    "ANOMALY_DETECTED" => Ok(ReasonCode::AnomalyDetected),
    "INTERNAL_ERROR" => Ok(ReasonCode::InternalError),
    other => Err(store_err(format!("unknown reason_code in audit_logs row: {other}"))),
  }
}
