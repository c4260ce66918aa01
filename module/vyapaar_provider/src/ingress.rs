//! Inbound payout discovery: paginated fetch of queued payouts from the
//! provider, for the polling-based ingress path that has replaced webhooks
//! as the primary trigger (`vyapaar_ingress` drives the loop; this module
//! only talks to the bridge).
//!
//! Grounded on `ingress/polling.py`'s `fetch_queued_payouts` /
//! `fetch_all_queued_payouts` pagination and `convert_to_payout_entity`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use vyapaar_types::{GovernanceError, PayoutEntity, PayoutId, PayoutStatus, Result};

use crate::bridge::ProviderBridge;

const MAX_PAYOUTS_PER_PAGE: u32 = 100;

/// A payout plus the out-of-band context (agent, vendor URL) carried in the
/// provider's free-form `notes` map rather than on the payout resource
/// itself.
#[derive(Debug, Clone)]
pub struct QueuedPayout
{
  pub payout: PayoutEntity,
  pub agent_id: String,
  pub vendor_url: Option<String>,
}

#[derive(Deserialize)]
struct RawPayoutPage
{
  #[serde(default)]
  items: Vec<RawPayout>,
}

#[derive(Deserialize)]
struct RawPayout
{
  id: String,
  #[serde(default = "default_entity")]
  entity: String,
  fund_account_id: Option<String>,
  amount: i64,
  #[serde(default = "default_currency")]
  currency: String,
  #[serde(default)]
  notes: serde_json::Map<String, serde_json::Value>,
  fees: Option<i64>,
  tax: Option<i64>,
  status: String,
  purpose: Option<String>,
  mode: Option<String>,
  reference_id: Option<String>,
  created_at: Option<i64>,
}

fn default_entity() -> String
{
  "payout".to_string()
}

fn default_currency() -> String
{
  "INR".to_string()
}

fn parse_status(raw: &str) -> PayoutStatus
{
  match raw
  {
    "processing" => PayoutStatus::Processing,
    "processed" => PayoutStatus::Processed,
    "reversed" => PayoutStatus::Reversed,
    "cancelled" | "rejected" => PayoutStatus::Cancelled,
    _ => PayoutStatus::Queued,
  }
}

fn convert(raw: RawPayout) -> Result<QueuedPayout>
{
  let payout_id = PayoutId::new(raw.id)?;
  let agent_id = raw
    .notes
    .get("agent_id")
    .and_then(|v| v.as_str())
    .unwrap_or("unknown")
    .to_string();
  let vendor_url = raw.notes.get("vendor_url").and_then(|v| v.as_str()).map(str::to_string);

  let payout = PayoutEntity
  {
    id: payout_id,
    entity: raw.entity,
    fund_account_id: raw.fund_account_id,
    amount: raw.amount,
    currency: raw.currency,
    fees: raw.fees,
    tax: raw.tax,
    status: parse_status(&raw.status),
    purpose: raw.purpose,
    mode: raw.mode,
    reference_id: raw.reference_id,
    created_at: raw.created_at.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
  };

  Ok(QueuedPayout { payout, agent_id, vendor_url })
}

/// Fetches queued payouts from the provider, one page at a time.
#[async_trait]
pub trait PayoutSource: Send + Sync
{
  /// Fetch every currently-queued payout, paginating until a short page
  /// signals the end of the result set.
  async fn fetch_all_queued_payouts(&self) -> Result<Vec<QueuedPayout>>;
}

/// Bridge-backed implementation of [`PayoutSource`].
pub struct RazorpayPayoutSource
{
  bridge: ProviderBridge,
  account_number: String,
}

impl RazorpayPayoutSource
{
  #[must_use]
  pub fn new(bridge: ProviderBridge, account_number: String) -> Self
  {
    Self { bridge, account_number }
  }

  async fn fetch_page(&self, count: u32, skip: u32) -> Result<Vec<RawPayout>>
  {
    let value = self
      .bridge
      .call(
        "payouts.fetch_all",
        json!({
          "account_number": self.account_number,
          "count": count,
          "skip": skip,
          "status": "queued",
        }),
      )
      .await
      .map_err(GovernanceError::Store)?;

    let page: RawPayoutPage = serde_json::from_value(value)
      .map_err(|e| GovernanceError::Store(format!("malformed payout page from provider bridge: {e}")))?;
    Ok(page.items)
  }
}

#[async_trait]
impl PayoutSource for RazorpayPayoutSource
{
  async fn fetch_all_queued_payouts(&self) -> Result<Vec<QueuedPayout>>
  {
    let mut all = Vec::new();
    let mut skip = 0u32;

    loop
    {
      let batch = self.fetch_page(MAX_PAYOUTS_PER_PAGE, skip).await?;
      let batch_len = batch.len();
      for raw in batch
      {
        all.push(convert(raw)?);
      }
      if batch_len < MAX_PAYOUTS_PER_PAGE as usize
      {
        break;
      }
      skip += MAX_PAYOUTS_PER_PAGE;
    }

    Ok(all)
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn unknown_status_strings_default_to_queued()
  {
    assert_eq!(parse_status("queued"), PayoutStatus::Queued);
    assert_eq!(parse_status("something_new"), PayoutStatus::Queued);
  }

  #[test]
  fn missing_notes_default_agent_to_unknown()
  {
    let raw = RawPayout
    {
      id: "pout_1".to_string(),
      entity: default_entity(),
      fund_account_id: None,
      amount: 500,
      currency: default_currency(),
      notes: serde_json::Map::new(),
      fees: None,
      tax: None,
      status: "queued".to_string(),
      purpose: None,
      mode: None,
      reference_id: None,
      created_at: None,
    };
    let converted = convert(raw).unwrap();
    assert_eq!(converted.agent_id, "unknown");
    assert!(converted.vendor_url.is_none());
  }
}
