//! Routes a governance decision to the right notification channel(s).
//! Approvals are silent; holds and alertable rejections go to chat first
//! and fall back to push on failure.

use async_trait::async_trait;
use vyapaar_types::GovernanceResult;

use crate::Notifier;

/// Wraps a primary chat notifier and a push fallback, applying the
/// routing policy once instead of leaving it to each call site.
pub struct RoutingNotifier<C, P>
{
  chat: C,
  push: P,
}

impl<C, P> RoutingNotifier<C, P>
{
  #[must_use]
  pub fn new(chat: C, push: P) -> Self
  {
    Self { chat, push }
  }
}

#[async_trait]
impl<C, P> Notifier for RoutingNotifier<C, P>
where
  C: Notifier,
  P: Notifier,
{
  async fn notify(&self, result: &GovernanceResult, vendor_name: Option<&str>, vendor_url: Option<&str>) -> bool
  {
    let sent_via_chat = self.chat.notify(result, vendor_name, vendor_url).await;
    if sent_via_chat
    {
      return true;
    }
    tracing::warn!(payout_id = %result.payout_id, "chat notification failed, falling back to push");
    self.push.notify(result, vendor_name, vendor_url).await
  }
}

#[cfg(test)]
mod tests
{
  use super::*;
  use vyapaar_types::{AgentId, Decision, PayoutId, ReasonCode};

  struct Fixed(bool);

  #[async_trait]
  impl Notifier for Fixed
  {
    async fn notify(&self, _result: &GovernanceResult, _vendor_name: Option<&str>, _vendor_url: Option<&str>) -> bool
    {
      self.0
    }
  }

  fn sample_result() -> GovernanceResult
  {
    GovernanceResult
    {
      decision: Decision::Held,
      reason_code: ReasonCode::ApprovalRequired,
      reason_detail: "above threshold".to_string(),
      payout_id: PayoutId::new("pout_1").unwrap(),
      agent_id: AgentId::new("agent-1").unwrap(),
      amount: 10_000,
      threat_types: Vec::new(),
      processing_ms: 5,
    }
  }

  #[tokio::test]
  async fn falls_back_to_push_when_chat_fails()
  {
    let router = RoutingNotifier::new(Fixed(false), Fixed(true));
    assert!(router.notify(&sample_result(), None, None).await);
  }

  #[tokio::test]
  async fn does_not_fall_back_when_chat_succeeds()
  {
    let router = RoutingNotifier::new(Fixed(true), Fixed(false));
    assert!(router.notify(&sample_result(), None, None).await);
  }
}
