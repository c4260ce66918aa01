//! In-memory fixtures standing in for the Redis, Postgres, and provider
//! bridge backed implementations elsewhere in the workspace, so the rest of
//! the crate's tests run without any external service.

mod atomic_store;
mod fake_provider;
mod relational_store;

pub use atomic_store::InMemoryAtomicStore;
pub use fake_provider::{FakeProviderClient, RecordedCall};
pub use relational_store::InMemoryRelationalStore;
