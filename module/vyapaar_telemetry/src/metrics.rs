//! Thread-safe counters and a latency histogram, rendered in a
//! Prometheus-like text exposition format. Grounded on the original's
//! `MetricsCollector` (`observability/__init__.py`) — hand-rolled plain
//! structs rather than pulling in an exposition library for a handful of
//! gauges.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

use vyapaar_types::{Decision, GovernanceResult};

const LATENCY_BUCKETS_MS: [u64; 8] = [5, 10, 25, 50, 100, 250, 500, 1000];

struct Inner
{
  decisions: BTreeMap<String, u64>,
  amounts_paise: BTreeMap<String, i64>,
  budget_checks: BTreeMap<&'static str, u64>,
  reputation_checks: BTreeMap<&'static str, u64>,
  slack_notifications: BTreeMap<&'static str, u64>,
  rate_limit_checks: BTreeMap<&'static str, u64>,
  gleif_checks: BTreeMap<&'static str, u64>,
  anomaly_checks: BTreeMap<&'static str, u64>,
  ntfy_notifications: BTreeMap<&'static str, u64>,
  latency_sum_ms: f64,
  latency_count: u64,
  latency_buckets: BTreeMap<u64, u64>,
  webhooks_received: u64,
  webhooks_invalid_sig: u64,
  webhooks_idempotent_skip: u64,
  polls_executed: u64,
  polls_payouts_found: u64,
}

impl Default for Inner
{
  fn default() -> Self
  {
    let mut budget_checks = BTreeMap::new();
    budget_checks.insert("ok", 0);
    budget_checks.insert("exceeded", 0);

    let mut reputation_checks = BTreeMap::new();
    reputation_checks.insert("safe", 0);
    reputation_checks.insert("unsafe", 0);
    reputation_checks.insert("error", 0);

    let mut slack_notifications = BTreeMap::new();
    slack_notifications.insert("sent", 0);
    slack_notifications.insert("failed", 0);

    let mut rate_limit_checks = BTreeMap::new();
    rate_limit_checks.insert("allowed", 0);
    rate_limit_checks.insert("blocked", 0);

    let mut gleif_checks = BTreeMap::new();
    gleif_checks.insert("verified", 0);
    gleif_checks.insert("unverified", 0);
    gleif_checks.insert("error", 0);

    let mut anomaly_checks = BTreeMap::new();
    anomaly_checks.insert("normal", 0);
    anomaly_checks.insert("anomalous", 0);
    anomaly_checks.insert("insufficient_data", 0);

    let mut ntfy_notifications = BTreeMap::new();
    ntfy_notifications.insert("sent", 0);
    ntfy_notifications.insert("failed", 0);

    let mut latency_buckets = BTreeMap::new();
    for b in LATENCY_BUCKETS_MS
    {
      latency_buckets.insert(b, 0);
    }

    Self
    {
      decisions: BTreeMap::new(),
      amounts_paise: BTreeMap::new(),
      budget_checks,
      reputation_checks,
      slack_notifications,
      rate_limit_checks,
      gleif_checks,
      anomaly_checks,
      ntfy_notifications,
      latency_sum_ms: 0.0,
      latency_count: 0,
      latency_buckets,
      webhooks_received: 0,
      webhooks_invalid_sig: 0,
      webhooks_idempotent_skip: 0,
      polls_executed: 0,
      polls_payouts_found: 0,
    }
  }
}

/// Thread-safe metrics collector. One instance per process, held in
/// `ServerContext` as an `Arc<MetricsCollector>`.
pub struct MetricsCollector
{
  inner: Mutex<Inner>,
  start: Instant,
}

impl Default for MetricsCollector
{
  fn default() -> Self
  {
    Self::new()
  }
}

impl MetricsCollector
{
  #[must_use]
  pub fn new() -> Self
  {
    Self
    {
      inner: Mutex::new(Inner::default()),
      start: Instant::now(),
    }
  }

  /// Record a terminal governance decision: updates the decision/reason
  /// counter, the per-decision amount total, and the latency histogram.
  pub fn record_decision(&self, result: &GovernanceResult)
  {
    let mut inner = self.inner.lock().expect("metrics mutex poisoned");
    let key = format!("{}|{}", result.decision.as_str(), result.reason_code.as_str());
    *inner.decisions.entry(key).or_insert(0) += 1;

    let amount_key = result.decision.as_str().to_string();
    *inner.amounts_paise.entry(amount_key).or_insert(0) += result.amount;

    let ms = result.processing_ms;
    inner.latency_sum_ms += ms as f64;
    inner.latency_count += 1;
    for bucket in LATENCY_BUCKETS_MS
    {
      if ms <= bucket
      {
        *inner.latency_buckets.entry(bucket).or_insert(0) += 1;
        break;
      }
    }
  }

  pub fn record_budget_check(&self, ok: bool)
  {
    let mut inner = self.inner.lock().expect("metrics mutex poisoned");
    let key = if ok { "ok" } else { "exceeded" };
    *inner.budget_checks.entry(key).or_insert(0) += 1;
  }

  pub fn record_reputation_check(&self, safe: bool, error: bool)
  {
    let mut inner = self.inner.lock().expect("metrics mutex poisoned");
    let key = if error { "error" } else if safe { "safe" } else { "unsafe" };
    *inner.reputation_checks.entry(key).or_insert(0) += 1;
  }

  pub fn record_slack_notification(&self, success: bool)
  {
    let mut inner = self.inner.lock().expect("metrics mutex poisoned");
    let key = if success { "sent" } else { "failed" };
    *inner.slack_notifications.entry(key).or_insert(0) += 1;
  }

  pub fn record_rate_limit_check(&self, allowed: bool)
  {
    let mut inner = self.inner.lock().expect("metrics mutex poisoned");
    let key = if allowed { "allowed" } else { "blocked" };
    *inner.rate_limit_checks.entry(key).or_insert(0) += 1;
  }

  pub fn record_webhook(&self, valid_sig: bool, idempotent_skip: bool)
  {
    let mut inner = self.inner.lock().expect("metrics mutex poisoned");
    inner.webhooks_received += 1;
    if !valid_sig
    {
      inner.webhooks_invalid_sig += 1;
    }
    if idempotent_skip
    {
      inner.webhooks_idempotent_skip += 1;
    }
  }

  pub fn record_poll(&self, payouts_found: u64)
  {
    let mut inner = self.inner.lock().expect("metrics mutex poisoned");
    inner.polls_executed += 1;
    inner.polls_payouts_found += payouts_found;
  }

  pub fn record_gleif_check(&self, verified: bool, error: bool)
  {
    let mut inner = self.inner.lock().expect("metrics mutex poisoned");
    let key = if error { "error" } else if verified { "verified" } else { "unverified" };
    *inner.gleif_checks.entry(key).or_insert(0) += 1;
  }

  pub fn record_anomaly_check(&self, anomalous: bool, model_trained: bool)
  {
    let mut inner = self.inner.lock().expect("metrics mutex poisoned");
    let key = if !model_trained { "insufficient_data" } else if anomalous { "anomalous" } else { "normal" };
    *inner.anomaly_checks.entry(key).or_insert(0) += 1;
  }

  pub fn record_ntfy_notification(&self, success: bool)
  {
    let mut inner = self.inner.lock().expect("metrics mutex poisoned");
    let key = if success { "sent" } else { "failed" };
    *inner.ntfy_notifications.entry(key).or_insert(0) += 1;
  }

  /// Seconds since this collector (i.e. the process) started.
  #[must_use]
  pub fn uptime_seconds(&self) -> u64
  {
    self.start.elapsed().as_secs()
  }

  /// Render all metrics in Prometheus text exposition format.
  #[must_use]
  pub fn render(&self) -> String
  {
    let inner = self.inner.lock().expect("metrics mutex poisoned");
    let mut out = String::new();

    out.push_str("# HELP vyapaar_decisions_total Total governance decisions\n");
    out.push_str("# TYPE vyapaar_decisions_total counter\n");
    for (key, count) in &inner.decisions
    {
      let (decision, reason) = key.split_once('|').unwrap_or((key.as_str(), ""));
      out.push_str(&format!(
        "vyapaar_decisions_total{{decision=\"{decision}\",reason_code=\"{reason}\"}} {count}\n"
      ));
    }

    out.push_str("# HELP vyapaar_payout_amount_paise_total Total payout amounts in paise\n");
    out.push_str("# TYPE vyapaar_payout_amount_paise_total counter\n");
    for (decision, total) in &inner.amounts_paise
    {
      out.push_str(&format!("vyapaar_payout_amount_paise_total{{decision=\"{decision}\"}} {total}\n"));
    }

    out.push_str("# HELP vyapaar_decision_latency_ms Decision processing latency in ms\n");
    out.push_str("# TYPE vyapaar_decision_latency_ms histogram\n");
    let mut cumulative = 0u64;
    for bucket in LATENCY_BUCKETS_MS
    {
      cumulative += inner.latency_buckets.get(&bucket).copied().unwrap_or(0);
      out.push_str(&format!("vyapaar_decision_latency_ms_bucket{{le=\"{bucket}\"}} {cumulative}\n"));
    }
    out.push_str(&format!(
      "vyapaar_decision_latency_ms_bucket{{le=\"+Inf\"}} {}\n",
      inner.latency_count
    ));
    out.push_str(&format!("vyapaar_decision_latency_ms_sum {}\n", inner.latency_sum_ms));
    out.push_str(&format!("vyapaar_decision_latency_ms_count {}\n", inner.latency_count));

    render_counter_map(&mut out, "vyapaar_budget_checks_total", "Budget check results", "result", &inner.budget_checks);
    render_counter_map(&mut out, "vyapaar_reputation_checks_total", "Reputation check results", "result", &inner.reputation_checks);
    render_counter_map(&mut out, "vyapaar_slack_notifications_total", "Slack notification outcomes", "result", &inner.slack_notifications);
    render_counter_map(&mut out, "vyapaar_rate_limit_checks_total", "Rate limit check results", "result", &inner.rate_limit_checks);

    render_scalar(&mut out, "vyapaar_webhooks_received_total", "Total webhooks received", inner.webhooks_received);
    render_scalar(&mut out, "vyapaar_webhooks_invalid_sig_total", "Webhooks with invalid signature", inner.webhooks_invalid_sig);
    render_scalar(&mut out, "vyapaar_webhooks_idempotent_skip_total", "Webhooks skipped (idempotent)", inner.webhooks_idempotent_skip);

    render_scalar(&mut out, "vyapaar_polls_executed_total", "Total poll cycles executed", inner.polls_executed);
    render_scalar(&mut out, "vyapaar_polls_payouts_found_total", "Total payouts found via polling", inner.polls_payouts_found);

    render_counter_map(&mut out, "vyapaar_gleif_checks_total", "GLEIF vendor verification results", "result", &inner.gleif_checks);
    render_counter_map(&mut out, "vyapaar_anomaly_checks_total", "Transaction anomaly scoring results", "result", &inner.anomaly_checks);
    render_counter_map(&mut out, "vyapaar_ntfy_notifications_total", "ntfy notification outcomes", "result", &inner.ntfy_notifications);

    out.push_str("# HELP vyapaar_uptime_seconds Server uptime in seconds\n");
    out.push_str("# TYPE vyapaar_uptime_seconds gauge\n");
    out.push_str(&format!("vyapaar_uptime_seconds {}\n", self.start.elapsed().as_secs()));

    out
  }
}

fn render_counter_map(out: &mut String, name: &str, help: &str, label: &str, map: &BTreeMap<&'static str, u64>)
{
  out.push_str(&format!("# HELP {name} {help}\n"));
  out.push_str(&format!("# TYPE {name} counter\n"));
  for (key, count) in map
  {
    out.push_str(&format!("{name}{{{label}=\"{key}\"}} {count}\n"));
  }
}

fn render_scalar(out: &mut String, name: &str, help: &str, value: u64)
{
  out.push_str(&format!("# HELP {name} {help}\n"));
  out.push_str(&format!("# TYPE {name} counter\n"));
  out.push_str(&format!("{name} {value}\n"));
}

#[cfg(test)]
mod tests
{
  use vyapaar_types::{AgentId, Decision, PayoutId, ReasonCode};

  use super::*;

  fn sample_result(decision: Decision, ms: u64) -> GovernanceResult
  {
    GovernanceResult
    {
      decision,
      reason_code: ReasonCode::PolicyOk,
      reason_detail: String::new(),
      payout_id: PayoutId::new("pout_1").unwrap(),
      agent_id: AgentId::new("agent_1").unwrap(),
      amount: 1000,
      threat_types: vec![],
      processing_ms: ms,
    }
  }

  #[test]
  fn histogram_buckets_are_cumulative()
  {
    let m = MetricsCollector::new();
    m.record_decision(&sample_result(Decision::Approved, 3));
    m.record_decision(&sample_result(Decision::Approved, 40));
    m.record_decision(&sample_result(Decision::Approved, 2000));

    let rendered = m.render();
    assert!(rendered.contains("vyapaar_decision_latency_ms_bucket{le=\"5\"} 1"));
    assert!(rendered.contains("vyapaar_decision_latency_ms_bucket{le=\"50\"} 2"));
    assert!(rendered.contains("vyapaar_decision_latency_ms_bucket{le=\"+Inf\"} 3"));
    assert!(rendered.contains("vyapaar_decision_latency_ms_count 3"));
  }

  #[test]
  fn decision_counter_keys_on_decision_and_reason()
  {
    let m = MetricsCollector::new();
    m.record_decision(&sample_result(Decision::Approved, 1));
    let rendered = m.render();
    assert!(rendered.contains("vyapaar_decisions_total{decision=\"APPROVED\",reason_code=\"POLICY_OK\"} 1"));
    assert!(rendered.contains("vyapaar_payout_amount_paise_total{decision=\"APPROVED\"} 1000"));
  }
}
