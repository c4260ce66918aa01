//! Logging bootstrap and metrics collection shared across the workspace.

pub mod logging;
pub mod metrics;

pub use logging::{init as init_logging, LogFormat};
pub use metrics::MetricsCollector;
