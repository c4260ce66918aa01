//! Push notification fallback client, modelled on ntfy.sh's publish API.
//! Grounded on `egress/ntfy_notifier.py`.

use std::time::Duration;

use serde_json::{json, Value};
use vyapaar_reliability::{BreakerSnapshot, CallError, CircuitBreaker};
use vyapaar_types::{Decision, GovernanceResult, ReasonCode};

use crate::Notifier;

const PRIORITY_HIGH: u8 = 4;

fn reason_tags(code: ReasonCode) -> &'static [&'static str]
{
  match code
  {
    ReasonCode::RiskHigh => &["skull", "warning"],
    ReasonCode::DomainBlocked => &["no_entry", "warning"],
    ReasonCode::LimitExceeded => &["moneybag", "x"],
    ReasonCode::TxnLimitExceeded => &["money_with_wings", "x"],
    ReasonCode::NoPolicy => &["clipboard", "x"],
    ReasonCode::RateLimited => &["hourglass", "x"],
    _ => &["x"],
  }
}

/// Push notification client, reached as a fallback when the chat notifier
/// fails or is unconfigured.
pub struct PushNotifier
{
  http: reqwest::Client,
  server_url: String,
  topic: String,
  breaker: CircuitBreaker,
}

impl PushNotifier
{
  #[must_use]
  pub fn new(server_url: impl Into<String>, topic: impl Into<String>, auth_token: Option<&str>) -> Self
  {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(10));
    if let Some(token) = auth_token
    {
      let mut headers = reqwest::header::HeaderMap::new();
      if let Ok(value) = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
      {
        headers.insert(reqwest::header::AUTHORIZATION, value);
      }
      builder = builder.default_headers(headers);
    }

    Self
    {
      http: builder.build().unwrap_or_default(),
      server_url: server_url.into().trim_end_matches('/').to_string(),
      topic: topic.into(),
      breaker: CircuitBreaker::new("push_notifier", 5, Duration::from_secs(30)),
    }
  }

  async fn post(&self, payload: Value) -> Result<bool, String>
  {
    let response = self.http.post(format!("{}/", self.server_url)).json(&payload).send().await.map_err(|e| e.to_string())?;
    Ok(matches!(response.status().as_u16(), 200 | 201))
  }

  /// Send a free-form push notification.
  pub async fn send(&self, message: &str, title: Option<&str>, priority: u8, tags: &[&str]) -> bool
  {
    let mut payload = json!({ "topic": self.topic, "message": message, "priority": priority });
    if let Some(title) = title
    {
      payload["title"] = json!(title);
    }
    if !tags.is_empty()
    {
      payload["tags"] = json!(tags);
    }

    let outcome: Result<bool, CallError<String>> = self.breaker.call(|| self.post(payload.clone())).await;
    match outcome
    {
      Ok(sent) => sent,
      Err(err) =>
      {
        tracing::error!(error = %err, "push notification failed");
        false
      }
    }
  }

  /// Reachability probe for `health_check`.
  pub async fn ping(&self) -> bool
  {
    self.http.get(format!("{}/v1/health", self.server_url)).send().await.map(|r| r.status().is_success()).unwrap_or(false)
  }

  /// Breaker state for `health_check`.
  pub async fn breaker_snapshot(&self) -> BreakerSnapshot
  {
    self.breaker.snapshot().await
  }
}

#[async_trait::async_trait]
impl Notifier for PushNotifier
{
  async fn notify(&self, result: &GovernanceResult, vendor_name: Option<&str>, vendor_url: Option<&str>) -> bool
  {
    let amount_rupees = result.amount as f64 / 100.0;
    let vendor_display = vendor_name.or(vendor_url).unwrap_or("Unknown");

    let (title, tags, message) = match result.decision
    {
      Decision::Approved => return true,
      Decision::Held =>
      (
        "Payout Approval Required".to_string(),
        vec!["warning", "moneybag"],
        format!(
          "Payout {}\nAmount: ₹{amount_rupees:.2}\nAgent: {}\nVendor: {vendor_display}\nReason: {}\n\nRequires human approval",
          result.payout_id, result.agent_id, result.reason_detail
        ),
      ),
      Decision::Rejected =>
      {
        // Same alertable-reason-code gate as `ChatNotifier`: most rejections
        // are routine policy outcomes and don't need a push alert.
        if !matches!(
          result.reason_code,
          ReasonCode::RiskHigh | ReasonCode::DomainBlocked | ReasonCode::LimitExceeded | ReasonCode::NoPolicy
        )
        {
          return true;
        }

        let threat_info = if result.threat_types.is_empty()
        {
          String::new()
        }
        else
        {
          format!("\nThreats: {}", result.threat_types.join(", "))
        };
        (
          format!("Payout Rejected — {}", result.reason_code),
          reason_tags(result.reason_code).to_vec(),
          format!(
            "Payout {}\nAmount: ₹{amount_rupees:.2}\nAgent: {}\nVendor: {vendor_display}\nReason: {}{threat_info}",
            result.payout_id, result.agent_id, result.reason_detail
          ),
        )
      }
    };

    self.send(&message, Some(&title), PRIORITY_HIGH, &tags).await
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn unmatched_reason_code_falls_back_to_generic_tag()
  {
    assert_eq!(reason_tags(ReasonCode::PolicyOk), &["x"]);
  }
}
