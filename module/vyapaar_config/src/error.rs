//! Configuration error type. Reports every missing/invalid key at once,
//! matching the original's `pydantic_settings` validator, rather than
//! failing fast on the first bad field.

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// One problem found while loading `Settings` from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigProblem
{
  Missing
  {
    var: &'static str,
  },
  Invalid
  {
    var: &'static str,
    detail: String,
  },
}

impl std::fmt::Display for ConfigProblem
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
  {
    match self
    {
      Self::Missing { var } => write!(f, "missing required environment variable {var}"),
      Self::Invalid { var, detail } => write!(f, "invalid value for {var}: {detail}"),
    }
  }
}

/// Aggregates every `ConfigProblem` found during one load attempt.
#[derive(Debug, thiserror::Error, Clone)]
#[error("configuration invalid: {}", render(.problems))]
pub struct ConfigError
{
  pub problems: Vec<ConfigProblem>,
}

fn render(problems: &[ConfigProblem]) -> String
{
  problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
