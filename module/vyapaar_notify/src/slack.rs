//! Chat notifier with interactive approve/reject callbacks, modelled on a
//! Slack-style Block Kit bot. Grounded on `egress/slack_notifier.py`.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use vyapaar_reliability::{BreakerSnapshot, CallError, CircuitBreaker};
use vyapaar_types::{Decision, GovernanceResult, ReasonCode};

use crate::Notifier;

const SIGNATURE_VERSION: &str = "v0";
const MAX_CLOCK_SKEW_S: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a signed interactive callback the way Slack's own request
/// signing does: HMAC-SHA256 over `v0:{timestamp}:{body}`, rejecting
/// requests older (or newer) than five minutes.
#[must_use]
pub fn verify_interactive_signature(
  signing_secret: &str,
  timestamp_header: &str,
  body: &str,
  signature_header: &str,
  now_unix: i64,
) -> bool
{
  let Ok(request_time) = timestamp_header.parse::<i64>()
  else
  {
    return false;
  };
  if (now_unix - request_time).abs() > MAX_CLOCK_SKEW_S
  {
    return false;
  }

  let base_string = format!("{SIGNATURE_VERSION}:{timestamp_header}:{body}");
  let Ok(mut mac) = HmacSha256::new_from_slice(signing_secret.as_bytes())
  else
  {
    return false;
  };
  mac.update(base_string.as_bytes());
  let expected = format!("{SIGNATURE_VERSION}={}", hex_encode(&mac.finalize().into_bytes()));

  expected.as_bytes().ct_eq(signature_header.as_bytes()).into()
}

fn hex_encode(bytes: &[u8]) -> String
{
  use std::fmt::Write as _;
  let mut out = String::with_capacity(bytes.len() * 2);
  for b in bytes
  {
    let _ = write!(out, "{b:02x}");
  }
  out
}

fn reason_emoji(code: ReasonCode) -> &'static str
{
  match code
  {
    ReasonCode::RiskHigh => "threat",
    ReasonCode::DomainBlocked => "blocked",
    ReasonCode::LimitExceeded | ReasonCode::TxnLimitExceeded => "money",
    ReasonCode::NoPolicy => "clipboard",
    _ => "cross",
  }
}

fn approval_blocks(result: &GovernanceResult, amount_rupees: f64, vendor_display: &str) -> Value
{
  json!([
    { "type": "header", "text": { "type": "plain_text", "text": "Payout Approval Required" } },
    {
      "type": "section",
      "fields": [
        { "type": "mrkdwn", "text": format!("*Payout ID:*\n`{}`", result.payout_id) },
        { "type": "mrkdwn", "text": format!("*Amount:*\n₹{amount_rupees:.2} ({} paise)", result.amount) },
        { "type": "mrkdwn", "text": format!("*Agent:*\n`{}`", result.agent_id) },
        { "type": "mrkdwn", "text": format!("*Vendor:*\n{vendor_display}") },
      ],
    },
    { "type": "section", "text": { "type": "mrkdwn", "text": format!("*Reason:* {}", result.reason_detail) } },
    {
      "type": "actions",
      "block_id": format!("approval_{}", result.payout_id),
      "elements": [
        { "type": "button", "text": { "type": "plain_text", "text": "Approve" }, "style": "primary", "action_id": "approve_payout", "value": result.payout_id.to_string() },
        { "type": "button", "text": { "type": "plain_text", "text": "Reject" }, "style": "danger", "action_id": "reject_payout", "value": result.payout_id.to_string() },
      ],
    },
  ])
}

fn rejection_blocks(result: &GovernanceResult, amount_rupees: f64, vendor_display: &str) -> Value
{
  let threat_text = if result.threat_types.is_empty()
  {
    String::new()
  }
  else
  {
    format!("\n*Threats Detected:* {}", result.threat_types.join(", "))
  };

  json!([
    { "type": "header", "text": { "type": "plain_text", "text": format!("Payout Rejected — {}", result.reason_code) } },
    {
      "type": "section",
      "fields": [
        { "type": "mrkdwn", "text": format!("*Payout ID:*\n`{}`", result.payout_id) },
        { "type": "mrkdwn", "text": format!("*Amount:*\n₹{amount_rupees:.2}") },
        { "type": "mrkdwn", "text": format!("*Agent:*\n`{}`", result.agent_id) },
        { "type": "mrkdwn", "text": format!("*Vendor:*\n{vendor_display}") },
      ],
    },
    { "type": "section", "text": { "type": "mrkdwn", "text": format!("*Detail:* {}{threat_text}", result.reason_detail) } },
  ])
}

/// Slack-style chat notifier: posts approval requests and rejection alerts
/// to a single configured channel, and verifies signed interactive-callback
/// requests from the channel's button clicks.
pub struct ChatNotifier
{
  http: reqwest::Client,
  api_base: String,
  bot_token: String,
  channel_id: String,
  breaker: CircuitBreaker,
}

impl ChatNotifier
{
  #[must_use]
  pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>, channel_id: impl Into<String>) -> Self
  {
    Self
    {
      http: reqwest::Client::builder().timeout(Duration::from_secs(10)).build().unwrap_or_default(),
      api_base: api_base.into(),
      bot_token: bot_token.into(),
      channel_id: channel_id.into(),
      breaker: CircuitBreaker::new("chat_notifier", 5, Duration::from_secs(30)),
    }
  }

  async fn post_message(&self, text: &str, blocks: Value) -> Result<bool, String>
  {
    let payload = json!({ "channel": self.channel_id, "text": text, "blocks": blocks });
    let response = self
      .http
      .post(format!("{}/chat.postMessage", self.api_base))
      .bearer_auth(&self.bot_token)
      .json(&payload)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    let data: Value = response.json().await.map_err(|e| e.to_string())?;
    Ok(data.get("ok").and_then(Value::as_bool).unwrap_or(false))
  }

  /// Replace the interactive buttons on a previously-sent approval message
  /// with a confirmation banner, once a reviewer has acted on it.
  pub async fn update_approval_message(
    &self,
    channel: &str,
    message_ts: &str,
    payout_id: &str,
    approved: bool,
    reviewer: &str,
  ) -> bool
  {
    let (emoji, verb) = if approved { ("done", "APPROVED") } else { ("cross", "REJECTED") };
    let blocks = json!([
      { "type": "section", "text": { "type": "mrkdwn", "text": format!("[{emoji}] *Payout `{payout_id}` {verb}*\nDecision by {reviewer}") } },
    ]);
    let payload = json!({ "channel": channel, "ts": message_ts, "blocks": blocks, "text": format!("Payout {payout_id} {verb} by {reviewer}") });

    let outcome = self
      .http
      .post(format!("{}/chat.update", self.api_base))
      .bearer_auth(&self.bot_token)
      .json(&payload)
      .send()
      .await;

    match outcome
    {
      Ok(response) => response.json::<Value>().await.ok().and_then(|v| v.get("ok").and_then(Value::as_bool)).unwrap_or(false),
      Err(err) =>
      {
        tracing::error!(error = %err, payout_id, "failed to update chat approval message");
        false
      }
    }
  }

  /// Reachability probe for `health_check`.
  pub async fn ping(&self) -> bool
  {
    self
      .http
      .post(format!("{}/auth.test", self.api_base))
      .bearer_auth(&self.bot_token)
      .send()
      .await
      .ok()
      .and_then(|r| r.error_for_status().ok())
      .is_some()
  }

  /// Breaker state for `health_check`.
  pub async fn breaker_snapshot(&self) -> BreakerSnapshot
  {
    self.breaker.snapshot().await
  }
}

#[async_trait::async_trait]
impl Notifier for ChatNotifier
{
  async fn notify(&self, result: &GovernanceResult, vendor_name: Option<&str>, vendor_url: Option<&str>) -> bool
  {
    if result.decision == Decision::Approved
    {
      return true;
    }
    if result.decision == Decision::Rejected
      && !matches!(
        result.reason_code,
        ReasonCode::RiskHigh | ReasonCode::DomainBlocked | ReasonCode::LimitExceeded | ReasonCode::NoPolicy
      )
    {
      return true;
    }

    let amount_rupees = result.amount as f64 / 100.0;
    let vendor_display = vendor_name.or(vendor_url).unwrap_or("Unknown Vendor");
    let (text, blocks) = match result.decision
    {
      Decision::Held =>
      (
        format!("Approval Required: ₹{amount_rupees:.2} payout by {}", result.agent_id),
        approval_blocks(result, amount_rupees, vendor_display),
      ),
      _ =>
      (
        format!("Payout Rejected: ₹{amount_rupees:.2} — {}", result.reason_code),
        rejection_blocks(result, amount_rupees, vendor_display),
      ),
    };

    let outcome: Result<bool, CallError<String>> = self.breaker.call(|| self.post_message(&text, blocks)).await;
    match outcome
    {
      Ok(sent) => sent,
      Err(err) =>
      {
        tracing::error!(error = %err, payout_id = %result.payout_id, "chat notification failed");
        false
      }
    }
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn rejects_stale_timestamp()
  {
    let ok = verify_interactive_signature("secret", "100", "body", "v0=whatever", 100 + MAX_CLOCK_SKEW_S + 1);
    assert!(!ok);
  }

  #[test]
  fn accepts_correctly_signed_request()
  {
    let secret = "shhh";
    let timestamp = "1700000000";
    let body = "payload=foo";
    let base_string = format!("v0:{timestamp}:{body}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(base_string.as_bytes());
    let signature = format!("v0={}", hex_encode(&mac.finalize().into_bytes()));

    assert!(verify_interactive_signature(secret, timestamp, body, &signature, 1_700_000_010));
  }

  #[test]
  fn reason_emoji_has_a_case_for_every_reason_code()
  {
    assert_eq!(reason_emoji(ReasonCode::RiskHigh), "threat");
    assert_eq!(reason_emoji(ReasonCode::PolicyOk), "cross");
  }
}
