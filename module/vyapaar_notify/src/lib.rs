//! Notification clients for governance decisions: a chat (Slack-style)
//! notifier with signed interactive callbacks, a push (ntfy-style)
//! fallback, and a router that applies the APPROVED/HELD/REJECTED policy.

mod ntfy;
mod router;
mod slack;

use async_trait::async_trait;
use vyapaar_types::GovernanceResult;

pub use ntfy::PushNotifier;
pub use router::RoutingNotifier;
pub use slack::{verify_interactive_signature, ChatNotifier};

/// Delivers a governance decision to a human-facing channel.
#[async_trait]
pub trait Notifier: Send + Sync
{
  /// Returns `true` iff the notification was delivered. Callers treat a
  /// `false` as "try the next channel", never as a reason to change the
  /// governance decision itself.
  async fn notify(&self, result: &GovernanceResult, vendor_name: Option<&str>, vendor_url: Option<&str>) -> bool;
}
