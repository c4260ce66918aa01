//! In-memory stand-in for the bridge-backed provider clients, so governance
//! and ingress tests never need to spawn a real subprocess binary.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use vyapaar_provider::{PayoutActions, PayoutSource, QueuedPayout};
use vyapaar_types::{PayoutId, Result};

/// One recorded call against [`FakeProviderClient`], for assertions on what
/// a governance decision actually triggered downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall
{
  Approve(String),
  Reject(String, String),
}

/// Fake provider client: queued payouts are seeded up front via
/// [`FakeProviderClient::push_queued`], approve/reject calls are recorded
/// rather than sent anywhere, and `ping` always answers healthy unless
/// overridden with [`FakeProviderClient::set_healthy`].
#[derive(Default)]
pub struct FakeProviderClient
{
  queued: Mutex<Vec<QueuedPayout>>,
  calls: Mutex<Vec<RecordedCall>>,
  healthy: Mutex<Option<bool>>,
}

impl FakeProviderClient
{
  #[must_use]
  pub fn new() -> Self
  {
    Self::default()
  }

  pub fn push_queued(&self, payout: QueuedPayout)
  {
    self.queued.lock().unwrap().push(payout);
  }

  pub fn set_healthy(&self, healthy: bool)
  {
    *self.healthy.lock().unwrap() = Some(healthy);
  }

  #[must_use]
  pub fn calls(&self) -> Vec<RecordedCall>
  {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl PayoutActions for FakeProviderClient
{
  async fn approve_payout(&self, payout_id: &PayoutId) -> Result<Value>
  {
    self.calls.lock().unwrap().push(RecordedCall::Approve(payout_id.as_str().to_string()));
    Ok(json!({ "id": payout_id.as_str(), "status": "processing" }))
  }

  async fn reject_payout(&self, payout_id: &PayoutId, reason: &str) -> Result<Value>
  {
    self
      .calls
      .lock()
      .unwrap()
      .push(RecordedCall::Reject(payout_id.as_str().to_string(), reason.to_string()));
    Ok(json!({ "id": payout_id.as_str(), "status": "cancelled" }))
  }

  async fn ping(&self) -> bool
  {
    self.healthy.lock().unwrap().unwrap_or(true)
  }
}

#[async_trait]
impl PayoutSource for FakeProviderClient
{
  async fn fetch_all_queued_payouts(&self) -> Result<Vec<QueuedPayout>>
  {
    Ok(self.queued.lock().unwrap().drain(..).collect())
  }
}

#[cfg(test)]
mod tests
{
  use vyapaar_types::{PayoutEntity, PayoutStatus};

  use super::*;

  fn sample_payout() -> QueuedPayout
  {
    QueuedPayout
    {
      payout: PayoutEntity
      {
        id: PayoutId::new("pout_1").unwrap(),
        entity: "payout".to_string(),
        fund_account_id: None,
        amount: 100,
        currency: "INR".to_string(),
        fees: None,
        tax: None,
        status: PayoutStatus::Queued,
        purpose: None,
        mode: None,
        reference_id: None,
        created_at: None,
      },
      agent_id: "agent-1".to_string(),
      vendor_url: None,
    }
  }

  #[tokio::test]
  async fn fetch_drains_the_seeded_queue()
  {
    let client = FakeProviderClient::new();
    client.push_queued(sample_payout());
    assert_eq!(client.fetch_all_queued_payouts().await.unwrap().len(), 1);
    assert!(client.fetch_all_queued_payouts().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn approve_and_reject_are_recorded()
  {
    let client = FakeProviderClient::new();
    let id = PayoutId::new("pout_1").unwrap();
    client.approve_payout(&id).await.unwrap();
    client.reject_payout(&id, "risk_high").await.unwrap();

    assert_eq!(
      client.calls(),
      vec![RecordedCall::Approve("pout_1".to_string()), RecordedCall::Reject("pout_1".to_string(), "risk_high".to_string())]
    );
  }
}
