//! Webhook signature verification, payload bounds, and event parsing.
//! Grounded on `ingress/webhook.py`.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use vyapaar_types::{PayoutEntity, PayoutId, PayoutStatus, WebhookValidationError};

const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;
const MIN_PAYLOAD_SIZE: usize = 10;

type HmacSha256 = Hmac<Sha256>;

/// Verify `X-Razorpay-Signature` over the raw body via HMAC-SHA256,
/// constant-time compared.
#[must_use]
pub fn verify_signature(body: &[u8], signature_hex: &str, secret: &str) -> bool
{
  let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes())
  else
  {
    return false;
  };
  mac.update(body);
  let expected = hex_encode(&mac.finalize().into_bytes());
  expected.as_bytes().ct_eq(signature_hex.as_bytes()).into()
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

/// Rejects obviously-malformed input before it is even parsed as JSON:
/// empty, below the 10 byte floor, or above the 1 MiB ceiling.
pub fn validate_payload_size(body: &[u8]) -> Result<(), WebhookValidationError>
{
  if body.is_empty()
  {
    return Err(WebhookValidationError::Empty);
  }
  if body.len() > MAX_PAYLOAD_SIZE
  {
    return Err(WebhookValidationError::TooLarge { size: body.len() });
  }
  if body.len() < MIN_PAYLOAD_SIZE
  {
    return Err(WebhookValidationError::TooShort { size: body.len() });
  }
  Ok(())
}

#[derive(Deserialize)]
struct WebhookEvent
{
  event: String,
  payload: WebhookPayload,
}

#[derive(Deserialize)]
struct WebhookPayload
{
  payout: WebhookPayoutWrapper,
}

#[derive(Deserialize)]
struct WebhookPayoutWrapper
{
  entity: WebhookPayoutEntity,
}

#[derive(Deserialize)]
struct WebhookPayoutEntity
{
  id: String,
  #[serde(default)]
  entity: Option<String>,
  fund_account_id: Option<String>,
  amount: i64,
  #[serde(default)]
  currency: Option<String>,
  #[serde(default)]
  notes: serde_json::Map<String, serde_json::Value>,
  fees: Option<i64>,
  tax: Option<i64>,
  #[serde(default)]
  status: Option<String>,
  purpose: Option<String>,
  mode: Option<String>,
  reference_id: Option<String>,
}

/// A parsed, not-yet-governed webhook event.
#[derive(Debug, Clone)]
pub struct ParsedWebhookEvent
{
  pub event: String,
  pub payout: PayoutEntity,
  pub agent_id: String,
  pub vendor_url: Option<String>,
  pub idempotency_key: String,
}

fn parse_status(raw: Option<&str>) -> PayoutStatus
{
  match raw
  {
    Some("processing") => PayoutStatus::Processing,
    Some("processed") => PayoutStatus::Processed,
    Some("reversed") => PayoutStatus::Reversed,
    Some("cancelled" | "rejected") => PayoutStatus::Cancelled,
    _ => PayoutStatus::Queued,
  }
}

/// Parse a validated payload into the shape the governance pipeline needs,
/// deriving the idempotency key as `{event}:{payout_id}`.
pub fn parse_event(body: &[u8]) -> Result<ParsedWebhookEvent, WebhookValidationError>
{
  let parsed: WebhookEvent =
    serde_json::from_slice(body).map_err(|e| WebhookValidationError::Malformed { detail: e.to_string() })?;

  let raw = parsed.payload.payout.entity;
  let payout_id =
    PayoutId::new(raw.id.clone()).map_err(|e| WebhookValidationError::Malformed { detail: e.to_string() })?;

  let agent_id = raw.notes.get("agent_id").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
  let vendor_url = raw.notes.get("vendor_url").and_then(|v| v.as_str()).map(str::to_string);

  let idempotency_key = format!("{}:{}", parsed.event, raw.id);

  let payout = PayoutEntity
  {
    id: payout_id,
    entity: raw.entity.unwrap_or_else(|| "payout".to_string()),
    fund_account_id: raw.fund_account_id,
    amount: raw.amount,
    currency: raw.currency.unwrap_or_else(|| "INR".to_string()),
    fees: raw.fees,
    tax: raw.tax,
    status: parse_status(raw.status.as_deref()),
    purpose: raw.purpose,
    mode: raw.mode,
    reference_id: raw.reference_id,
    created_at: None,
  };

  Ok(ParsedWebhookEvent { event: parsed.event, payout, agent_id, vendor_url, idempotency_key })
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn rejects_payload_below_floor()
  {
    assert!(matches!(validate_payload_size(b"{}"), Err(WebhookValidationError::TooShort { .. })));
  }

  #[test]
  fn rejects_empty_payload()
  {
    assert!(matches!(validate_payload_size(b""), Err(WebhookValidationError::Empty)));
  }

  #[test]
  fn signature_matches_known_vector()
  {
    let body = b"hello world payload";
    let secret = "topsecret";
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    let sig = hex_encode(&mac.finalize().into_bytes());
    assert!(verify_signature(body, &sig, secret));
    assert!(!verify_signature(body, "deadbeef", secret));
  }

  #[test]
  fn derives_idempotency_key_from_event_and_payout_id()
  {
    let body = br#"{"event":"payout.queued","payload":{"payout":{"entity":{"id":"pout_abc","amount":500}}}}"#;
    let parsed = parse_event(body).unwrap();
    assert_eq!(parsed.idempotency_key, "payout.queued:pout_abc");
    assert_eq!(parsed.agent_id, "unknown");
  }
}
