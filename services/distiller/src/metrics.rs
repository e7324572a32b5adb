//! Prometheus metrics exposition
//!
//! Pipeline metrics (the key pool records its own `key_pool_*` counters):
//!
//! - `distill_calls_total` (counter): labels `provider`, `outcome`
//! - `distill_call_duration_seconds` (histogram): label `provider`
//! - `distill_chunks_total` (counter): label `outcome`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Histogram buckets for upstream call latency, 100ms to 5 minutes.
const CALL_DURATION_BUCKETS: &[f64] = &[
    0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("distill_call_duration_seconds".to_string()),
        CALL_DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record one upstream call and how it ended (`success` or a failure class label).
pub fn record_call(provider: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "distill_calls_total",
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("distill_call_duration_seconds", "provider" => provider.to_string())
        .record(duration_secs);
}

/// Record final chunk outcomes (`distilled`, `failed`, `skipped`).
pub fn record_chunks(outcome: &'static str, count: u64) {
    metrics::counter!("distill_chunks_total", "outcome" => outcome).increment(count);
}
