//! Postgres-backed relational store: agent policies and the audit log.
//! Exclusive owner of this state, as opposed to `vyapaar_store`'s ownership
//! of budget/rate-limit/idempotency state.

pub mod audit;
pub mod postgres_store;
pub mod relational_store;

pub use audit::AuditWriter;
pub use postgres_store::PostgresStore;
pub use relational_store::{AuditLogFilter, RelationalStore};
