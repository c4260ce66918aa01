//! Identifier newtypes.
//!
//! Payout and agent IDs are assigned by callers or by Razorpay, not minted
//! locally, so these wrappers validate non-emptiness rather than generating
//! a prefixed UUID the way an internally-issued ID would.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A Razorpay payout identifier (e.g. `"pout_abc123"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayoutId(String);

impl PayoutId
{
  /// Wrap a raw string, rejecting empty input.
  pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError>
  {
    let raw = raw.into();
    if raw.trim().is_empty()
    {
      return Err(ValidationError::EmptyId { field: "payout_id" });
    }
    Ok(Self(raw))
  }

  /// Borrow the underlying string.
  #[must_use]
  pub fn as_str(&self) -> &str
  {
    &self.0
  }
}

impl fmt::Display for PayoutId
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
  {
    write!(f, "{}", self.0)
  }
}

/// Identifies the calling AI agent, not a person.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId
{
  /// Wrap a raw string, rejecting empty input.
  pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError>
  {
    let raw = raw.into();
    if raw.trim().is_empty()
    {
      return Err(ValidationError::EmptyId { field: "agent_id" });
    }
    Ok(Self(raw))
  }

  /// Borrow the underlying string.
  #[must_use]
  pub fn as_str(&self) -> &str
  {
    &self.0
  }
}

impl fmt::Display for AgentId
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
  {
    write!(f, "{}", self.0)
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn rejects_empty_ids()
  {
    assert!(PayoutId::new("").is_err());
    assert!(AgentId::new("   ").is_err());
  }

  #[test]
  fn accepts_valid_ids()
  {
    assert_eq!(PayoutId::new("pout_abc").unwrap().as_str(), "pout_abc");
    assert_eq!(AgentId::new("agent-007").unwrap().as_str(), "agent-007");
  }
}
