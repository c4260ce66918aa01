//! Shared types for the vyapaar governance workspace: validated identifiers,
//! the payout/policy/decision domain model, and the error taxonomy every
//! other crate's `Result` is built from.

pub mod domain;
pub mod error;
pub mod ids;

pub use domain::{
  AgentPolicy, AuditEntry, Decision, GovernanceResult, IngressOutcome, PayoutEntity, PayoutStatus,
  ReasonCode,
};
pub use error::{
  AuditWriteError, GovernanceError, Result, TransientDependencyError, ValidationError,
  WebhookValidationError,
};
pub use ids::{AgentId, PayoutId};
