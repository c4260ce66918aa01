//! Logging bootstrap: `tracing` + `tracing-subscriber`, selectable text/json
//! output, matching `logging_config.py`'s `configure_logging`.

use tracing_subscriber::EnvFilter;

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
  Text,
  Json,
}

impl LogFormat
{
  /// Parse `VYAPAAR_LOG_FORMAT`-style values; anything other than `"json"`
  /// (case-insensitive) falls back to text.
  #[must_use]
  pub fn from_str_lenient(s: &str) -> Self
  {
    if s.eq_ignore_ascii_case("json")
    {
      Self::Json
    }
    else
    {
      Self::Text
    }
  }
}

/// Initialise the global `tracing` subscriber. Call once at process start.
///
/// `level` follows `tracing_subscriber::EnvFilter` syntax (e.g. `"info"`,
/// `"vyapaar_governance=debug,info"`). Third-party crates that are noisy at
/// INFO (`hyper`, `reqwest`) are held at WARN unless the filter overrides
/// them explicitly, mirroring the original's silencing of `httpx`/`httpcore`.
pub fn init(level: &str, format: LogFormat)
{
  let filter = EnvFilter::try_new(level)
    .unwrap_or_else(|_| EnvFilter::new("info"))
    .add_directive("hyper=warn".parse().expect("static directive parses"))
    .add_directive("reqwest=warn".parse().expect("static directive parses"));

  let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

  let result = match format
  {
    LogFormat::Json => subscriber.json().try_init(),
    LogFormat::Text => subscriber.try_init(),
  };

  if let Err(err) = result
  {
    eprintln!("tracing subscriber already initialised: {err}");
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn lenient_parse_defaults_to_text()
  {
    assert_eq!(LogFormat::from_str_lenient("json"), LogFormat::Json);
    assert_eq!(LogFormat::from_str_lenient("JSON"), LogFormat::Json);
    assert_eq!(LogFormat::from_str_lenient("text"), LogFormat::Text);
    assert_eq!(LogFormat::from_str_lenient("garbage"), LogFormat::Text);
  }
}
