//! Atomic budget, rate-limit, idempotency, reputation-cache and
//! anomaly-history store. The `AtomicStore` trait is the sole authority for
//! cross-request coordination; everything else in the workspace treats its
//! state as opaque.

pub mod model;
pub mod redis_store;
mod trait_def;

pub use model::{AnomalySample, CachedReputation};
pub use redis_store::RedisAtomicStore;
pub use trait_def::AtomicStore;
