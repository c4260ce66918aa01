//! `Settings`: typed configuration loaded from `VYAPAAR_*` environment
//! variables. Grounded on `original_source/src/vyapaar_mcp/config.py`'s flat
//! `pydantic_settings.BaseSettings` shape; the Azure AI Foundry / Archestra /
//! dual-LLM quarantine fields present there are explicitly out of scope and
//! are not carried here.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ConfigError, ConfigProblem, Result};

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct Settings
{
  pub razorpay_key_id: String,
  pub razorpay_key_secret: String,
  pub razorpay_webhook_secret: String,
  pub razorpay_account_number: Option<String>,
  pub razorpay_api_base: String,
  pub razorpay_bridge_binary: String,

  pub safe_browsing_api_key: String,
  pub safe_browsing_api_url: String,
  pub gleif_api_url: String,

  pub postgres_dsn: String,
  pub redis_url: String,

  pub host: String,
  pub port: u16,
  pub log_level: String,
  pub log_format: String,

  pub poll_interval: Duration,
  pub auto_poll: bool,
  pub dev_mode: bool,

  pub slack_bot_token: Option<String>,
  pub slack_channel_id: Option<String>,
  pub slack_signing_secret: Option<String>,

  pub ntfy_topic: Option<String>,
  pub ntfy_url: String,
  pub ntfy_auth_token: Option<String>,

  pub rate_limit_max_requests: u32,
  pub rate_limit_window_seconds: u64,

  pub circuit_breaker_failure_threshold: u32,
  pub circuit_breaker_recovery_timeout: Duration,

  pub anomaly_risk_threshold: f64,
  pub audit_fallback_dir: String,
}

const MIN_POLL_INTERVAL_S: u64 = 5;
const MAX_POLL_INTERVAL_S: u64 = 300;

impl Settings
{
  /// Load from the process environment, collecting every problem before
  /// returning (not fail-fast-on-first).
  pub fn from_env() -> Result<Self>
  {
    let vars: HashMap<String, String> = std::env::vars().collect();
    Self::from_map(&vars)
  }

  /// Load from an explicit map — used by `from_env` and by tests that don't
  /// want to mutate the real process environment.
  pub fn from_map(vars: &HashMap<String, String>) -> Result<Self>
  {
    let mut problems = Vec::new();
    let get = |key: &'static str| vars.get(key).cloned();

    let required = |key: &'static str, problems: &mut Vec<ConfigProblem>| -> String
    {
      match get(key)
      {
        Some(v) if !v.trim().is_empty() => v,
        _ =>
        {
          problems.push(ConfigProblem::Missing { var: key });
          String::new()
        }
      }
    };

    let razorpay_key_id = required("VYAPAAR_RAZORPAY_KEY_ID", &mut problems);
    let razorpay_key_secret = required("VYAPAAR_RAZORPAY_KEY_SECRET", &mut problems);
    let razorpay_webhook_secret = required("VYAPAAR_RAZORPAY_WEBHOOK_SECRET", &mut problems);
    let safe_browsing_api_key = required("VYAPAAR_GOOGLE_SAFE_BROWSING_KEY", &mut problems);
    let postgres_dsn = required("VYAPAAR_POSTGRES_DSN", &mut problems);

    let poll_interval_raw = parse_optional(&get("VYAPAAR_POLL_INTERVAL"), 30u64, "VYAPAAR_POLL_INTERVAL", &mut problems);
    let poll_interval_s = poll_interval_raw.clamp(MIN_POLL_INTERVAL_S, MAX_POLL_INTERVAL_S);

    let port = parse_optional(&get("VYAPAAR_PORT"), 8080u16, "VYAPAAR_PORT", &mut problems);
    let rate_limit_max_requests = parse_optional(&get("VYAPAAR_RATE_LIMIT_MAX_REQUESTS"), 10u32, "VYAPAAR_RATE_LIMIT_MAX_REQUESTS", &mut problems);
    let rate_limit_window_seconds = parse_optional(&get("VYAPAAR_RATE_LIMIT_WINDOW_SECONDS"), 60u64, "VYAPAAR_RATE_LIMIT_WINDOW_SECONDS", &mut problems);
    let circuit_breaker_failure_threshold = parse_optional(&get("VYAPAAR_CIRCUIT_BREAKER_FAILURE_THRESHOLD"), 5u32, "VYAPAAR_CIRCUIT_BREAKER_FAILURE_THRESHOLD", &mut problems);
    let circuit_breaker_recovery_timeout_s = parse_optional(&get("VYAPAAR_CIRCUIT_BREAKER_RECOVERY_TIMEOUT"), 30u64, "VYAPAAR_CIRCUIT_BREAKER_RECOVERY_TIMEOUT", &mut problems);
    let anomaly_risk_threshold = parse_optional(&get("VYAPAAR_ANOMALY_RISK_THRESHOLD"), 0.75f64, "VYAPAAR_ANOMALY_RISK_THRESHOLD", &mut problems);
    let auto_poll = parse_optional(&get("VYAPAAR_AUTO_POLL"), true, "VYAPAAR_AUTO_POLL", &mut problems);
    let dev_mode = parse_optional(&get("VYAPAAR_DEV_MODE"), false, "VYAPAAR_DEV_MODE", &mut problems);

    if !problems.is_empty()
    {
      return Err(ConfigError { problems });
    }

    Ok(Self
    {
      razorpay_key_id,
      razorpay_key_secret,
      razorpay_webhook_secret,
      razorpay_account_number: get("VYAPAAR_RAZORPAY_ACCOUNT_NUMBER"),
      razorpay_api_base: get("VYAPAAR_RAZORPAY_API_BASE").unwrap_or_else(|| "https://api.razorpay.com/v1".to_string()),
      razorpay_bridge_binary: get("VYAPAAR_RAZORPAY_BRIDGE_BINARY").unwrap_or_else(|| "razorpay-mcp-server".to_string()),

      safe_browsing_api_key,
      safe_browsing_api_url: get("VYAPAAR_SAFE_BROWSING_API_URL")
        .unwrap_or_else(|| "https://safebrowsing.googleapis.com/v4/threatMatches:find".to_string()),
      gleif_api_url: get("VYAPAAR_GLEIF_API_URL").unwrap_or_else(|| "https://api.gleif.org/api/v1/lei-records".to_string()),

      postgres_dsn,
      redis_url: get("VYAPAAR_REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),

      host: get("VYAPAAR_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
      port,
      log_level: get("VYAPAAR_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
      log_format: get("VYAPAAR_LOG_FORMAT").unwrap_or_else(|| "text".to_string()),

      poll_interval: Duration::from_secs(poll_interval_s),
      auto_poll,
      dev_mode,

      slack_bot_token: get("VYAPAAR_SLACK_BOT_TOKEN"),
      slack_channel_id: get("VYAPAAR_SLACK_CHANNEL_ID"),
      slack_signing_secret: get("VYAPAAR_SLACK_SIGNING_SECRET"),

      ntfy_topic: get("VYAPAAR_NTFY_TOPIC"),
      ntfy_url: get("VYAPAAR_NTFY_URL").unwrap_or_else(|| "https://ntfy.sh".to_string()),
      ntfy_auth_token: get("VYAPAAR_NTFY_AUTH_TOKEN"),

      rate_limit_max_requests,
      rate_limit_window_seconds,

      circuit_breaker_failure_threshold,
      circuit_breaker_recovery_timeout: Duration::from_secs(circuit_breaker_recovery_timeout_s),

      anomaly_risk_threshold,
      audit_fallback_dir: get("VYAPAAR_AUDIT_FALLBACK_DIR").unwrap_or_else(|| "./audit_fallback".to_string()),
    })
  }
}

fn parse_optional<T>(raw: &Option<String>, default: T, var: &'static str, problems: &mut Vec<ConfigProblem>) -> T
where
  T: std::str::FromStr,
{
  match raw
  {
    None => default,
    Some(v) => v.parse().unwrap_or_else(|_| {
      problems.push(ConfigProblem::Invalid { var, detail: format!("could not parse '{v}'") });
      default
    }),
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  fn base_map() -> HashMap<String, String>
  {
    let mut m = HashMap::new();
    m.insert("VYAPAAR_RAZORPAY_KEY_ID".into(), "rzp_test_1".into());
    m.insert("VYAPAAR_RAZORPAY_KEY_SECRET".into(), "secret".into());
    m.insert("VYAPAAR_RAZORPAY_WEBHOOK_SECRET".into(), "whsecret".into());
    m.insert("VYAPAAR_GOOGLE_SAFE_BROWSING_KEY".into(), "sbkey".into());
    m.insert("VYAPAAR_POSTGRES_DSN".into(), "postgres://localhost/vyapaar".into());
    m
  }

  #[test]
  fn loads_with_defaults_when_optional_vars_absent()
  {
    let settings = Settings::from_map(&base_map()).unwrap();
    assert_eq!(settings.poll_interval, Duration::from_secs(30));
    assert_eq!(settings.rate_limit_max_requests, 10);
    assert_eq!(settings.circuit_breaker_failure_threshold, 5);
    assert!((settings.anomaly_risk_threshold - 0.75).abs() < f64::EPSILON);
  }

  #[test]
  fn clamps_poll_interval_to_documented_range()
  {
    let mut m = base_map();
    m.insert("VYAPAAR_POLL_INTERVAL".into(), "1".into());
    let settings = Settings::from_map(&m).unwrap();
    assert_eq!(settings.poll_interval, Duration::from_secs(MIN_POLL_INTERVAL_S));

    m.insert("VYAPAAR_POLL_INTERVAL".into(), "9999".into());
    let settings = Settings::from_map(&m).unwrap();
    assert_eq!(settings.poll_interval, Duration::from_secs(MAX_POLL_INTERVAL_S));
  }

  #[test]
  fn reports_every_missing_required_key_at_once()
  {
    let err = Settings::from_map(&HashMap::new()).unwrap_err();
    assert_eq!(err.problems.len(), 5);
  }
}
