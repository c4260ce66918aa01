//! Persistent sub-process bridge to the Razorpay payout provider, plus the
//! egress (approve/reject) and ingress (fetch queued payouts) client traits
//! built on top of it.

mod bridge;
mod egress;
mod ingress;

pub use bridge::{BridgeConfig, ProviderBridge};
pub use egress::{PayoutActions, RazorpayActions};
pub use ingress::{PayoutSource, QueuedPayout, RazorpayPayoutSource};
