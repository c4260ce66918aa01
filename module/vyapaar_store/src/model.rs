//! Value types carried through the atomic store, independent of which
//! backend (Redis, in-memory) stores them.

use serde::{Deserialize, Serialize};

/// Cached result of a reputation lookup (URL threat or legal entity),
/// stored as opaque JSON so this crate does not depend on `vyapaar_reputation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedReputation
{
  /// Serialised reputation response body.
  pub payload: serde_json::Value,
}

/// One sample in an agent's rolling transaction history, used by the
/// anomaly scorer. Stored in insertion order, newest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnomalySample
{
  /// Amount in paise.
  pub amount: i64,
  /// Unix timestamp (seconds) the transaction was observed.
  pub observed_at: i64,
}
