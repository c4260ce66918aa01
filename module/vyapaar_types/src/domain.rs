//! Core domain model: payouts, policies, decisions, audit entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, PayoutId};

/// A Razorpay payout as it flows through governance. Fields beyond
/// `id`/`amount`/`currency`/`purpose` are carried for audit completeness
/// but are not read by the governance pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutEntity
{
  pub id: PayoutId,
  pub entity: String,
  pub fund_account_id: Option<String>,
  /// Amount in paise (1/100 INR). Always non-negative.
  pub amount: i64,
  pub currency: String,
  pub fees: Option<i64>,
  pub tax: Option<i64>,
  pub status: PayoutStatus,
  pub purpose: Option<String>,
  pub mode: Option<String>,
  pub reference_id: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

/// Lifecycle status of a payout resource at Razorpay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus
{
  Queued,
  Processing,
  Processed,
  Reversed,
  Cancelled,
}

/// Per-agent spending policy fetched from `vyapaar_db`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPolicy
{
  pub agent_id: AgentId,
  /// Maximum paise an agent may spend in a rolling 24h window.
  pub daily_limit: i64,
  /// Maximum paise for a single payout, if capped.
  pub per_txn_limit: Option<i64>,
  /// Amounts above this threshold are held for human approval.
  pub require_approval_above: Option<i64>,
  /// Host-only allowlist; if non-empty, a vendor domain must be in it.
  pub allowed_domains: Vec<String>,
  /// Host-only blocklist; checked before the allowlist.
  pub blocked_domains: Vec<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Terminal decision produced by the governance engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision
{
  Approved,
  Rejected,
  Held,
}

impl Decision
{
  /// Lowercase value matching the original service's log/audit encoding.
  #[must_use]
  pub fn as_str(self) -> &'static str
  {
    match self
    {
      Self::Approved => "APPROVED",
      Self::Rejected => "REJECTED",
      Self::Held => "HELD",
    }
  }
}

impl std::fmt::Display for Decision
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
  {
    write!(f, "{}", self.as_str())
  }
}

/// Why a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode
{
  PolicyOk,
  InvalidSignature,
  IdempotentSkip,
  NoPolicy,
  TxnLimitExceeded,
  RateLimited,
  LimitExceeded,
  DomainBlocked,
  RiskHigh,
  ApprovalRequired,
  AnomalyDetected,
  InternalError,
}

impl ReasonCode
{
  #[must_use]
  pub fn as_str(self) -> &'static str
  {
    match self
    {
      Self::PolicyOk => "POLICY_OK",
      Self::InvalidSignature => "INVALID_SIGNATURE",
      Self::IdempotentSkip => "IDEMPOTENT_SKIP",
      Self::NoPolicy => "NO_POLICY",
      Self::TxnLimitExceeded => "TXN_LIMIT_EXCEEDED",
      Self::RateLimited => "RATE_LIMITED",
      Self::LimitExceeded => "LIMIT_EXCEEDED",
      Self::DomainBlocked => "DOMAIN_BLOCKED",
      Self::RiskHigh => "RISK_HIGH",
      Self::ApprovalRequired => "APPROVAL_REQUIRED",
      Self::AnomalyDetected => "ANOMALY_DETECTED",
      Self::InternalError => "INTERNAL_ERROR",
    }
  }
}

impl std::fmt::Display for ReasonCode
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
  {
    write!(f, "{}", self.as_str())
  }
}

/// Output of a single governance evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceResult
{
  pub decision: Decision,
  pub reason_code: ReasonCode,
  pub reason_detail: String,
  pub payout_id: PayoutId,
  pub agent_id: AgentId,
  pub amount: i64,
  pub threat_types: Vec<String>,
  pub processing_ms: u64,
}

/// A durable record of one governance decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry
{
  pub payout_id: PayoutId,
  pub agent_id: AgentId,
  pub amount: i64,
  pub currency: String,
  pub vendor_name: Option<String>,
  pub vendor_url: Option<String>,
  pub decision: Decision,
  pub reason_code: ReasonCode,
  pub reason_detail: String,
  pub threat_types: Vec<String>,
  pub processing_ms: u64,
  pub created_at: DateTime<Utc>,
}

/// Outcome of handing one inbound event (webhook or poll item) to the
/// ingress coordinator, before (or instead of) governance evaluation.
#[derive(Debug, Clone)]
pub enum IngressOutcome
{
  /// The event was evaluated; carries the governance result.
  Evaluated(GovernanceResult),
  /// A duplicate idempotency key; never evaluated, never audited.
  DuplicateSkipped
  {
    /// The idempotency key that was already claimed.
    key: String,
  },
  /// An event type this server does not act on (e.g. `payout.processed`).
  UnsupportedEvent
  {
    /// The raw event name from the provider payload.
    event: String,
  },
}

impl AuditEntry
{
  /// Build an audit entry from a governance result plus vendor context not
  /// carried on [`GovernanceResult`] itself.
  #[must_use]
  pub fn from_result(
    result: &GovernanceResult,
    currency: String,
    vendor_name: Option<String>,
    vendor_url: Option<String>,
    created_at: DateTime<Utc>,
  ) -> Self
  {
    Self
    {
      payout_id: result.payout_id.clone(),
      agent_id: result.agent_id.clone(),
      amount: result.amount,
      currency,
      vendor_name,
      vendor_url,
      decision: result.decision,
      reason_code: result.reason_code,
      reason_detail: result.reason_detail.clone(),
      threat_types: result.threat_types.clone(),
      processing_ms: result.processing_ms,
      created_at,
    }
  }
}
