//! Inbound payout ingestion: webhook signature/size verification and the
//! continuous polling fallback, both funnelling into one idempotency-gated
//! coordinator in front of the governance pipeline.

mod coordinator;
mod poller;
mod webhook;

pub use coordinator::{DecisionSink, IngressCoordinator};
pub use poller::{clamp_poll_interval, PayoutPoller, PollerStats, DEFAULT_POLL_INTERVAL_S, MAX_POLL_INTERVAL_S, MIN_POLL_INTERVAL_S};
pub use webhook::{parse_event, validate_payload_size, verify_signature, ParsedWebhookEvent};
