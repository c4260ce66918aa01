//! Typed environment-backed configuration, loaded once at process start.

mod error;
mod settings;

pub use error::{ConfigError, ConfigProblem, Result};
pub use settings::Settings;
