//! Prometheus metrics for loan-analytics

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::{Error, Result};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

const METRIC_UPTIME: &str = "loan_analytics_uptime_seconds";
const METRIC_INFO: &str = "loan_analytics_info";

// Query metrics
const METRIC_QUERY_DURATION: &str = "loan_analytics_query_duration_seconds";
const METRIC_QUERY_TOTAL: &str = "loan_analytics_queries_total";
const METRIC_QUERY_ERRORS: &str = "loan_analytics_query_errors_total";
const METRIC_QUERY_ROWS: &str = "loan_analytics_query_rows_total";
const METRIC_RETRIES: &str = "loan_analytics_retries_total";

// Cache metrics
const METRIC_CACHE_HITS: &str = "loan_analytics_cache_hits_total";
const METRIC_CACHE_MISSES: &str = "loan_analytics_cache_misses_total";
const METRIC_CACHE_EVICTIONS: &str = "loan_analytics_cache_evictions_total";
const METRIC_CACHE_SIZE: &str = "loan_analytics_cache_size";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Process uptime in seconds");
    describe_gauge!(METRIC_INFO, "Build information (always 1)");

    describe_histogram!(METRIC_QUERY_DURATION, "Query execution duration in seconds");
    describe_counter!(METRIC_QUERY_TOTAL, "Total queries executed");
    describe_counter!(METRIC_QUERY_ERRORS, "Total query errors by kind");
    describe_counter!(METRIC_QUERY_ROWS, "Total rows returned by queries");
    describe_counter!(METRIC_RETRIES, "Total retries of transient warehouse failures");

    describe_counter!(METRIC_CACHE_HITS, "Total cache hits");
    describe_counter!(METRIC_CACHE_MISSES, "Total cache misses");
    describe_counter!(METRIC_CACHE_EVICTIONS, "Total cache evictions");
    describe_gauge!(METRIC_CACHE_SIZE, "Current cache size (entries)");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record a successful query execution.
pub fn record_query(query: &str, duration: Duration, row_count: u64, cached: bool) {
    let cached_label = if cached { "hit" } else { "miss" };

    histogram!(
        METRIC_QUERY_DURATION,
        "query" => query.to_owned(),
        "cached" => cached_label.to_owned(),
    )
    .record(duration.as_secs_f64());

    counter!(
        METRIC_QUERY_TOTAL,
        "query" => query.to_owned(),
        "status" => "success".to_owned(),
        "cached" => cached_label.to_owned(),
    )
    .increment(1);

    counter!(METRIC_QUERY_ROWS, "query" => query.to_owned()).increment(row_count);
}

/// Record a failed query by error kind.
pub fn record_query_error(query: &str, kind: &str) {
    counter!(
        METRIC_QUERY_ERRORS,
        "query" => query.to_owned(),
        "kind" => kind.to_owned(),
    )
    .increment(1);

    counter!(
        METRIC_QUERY_TOTAL,
        "query" => query.to_owned(),
        "status" => "error".to_owned(),
        "cached" => "miss".to_owned(),
    )
    .increment(1);
}

/// Record one retry of a transient failure.
pub fn record_retry(operation: &str) {
    counter!(METRIC_RETRIES, "operation" => operation.to_owned()).increment(1);
}

/// Record a cache hit.
pub fn record_cache_hit(domain: &str) {
    counter!(METRIC_CACHE_HITS, "domain" => domain.to_owned()).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss(domain: &str) {
    counter!(METRIC_CACHE_MISSES, "domain" => domain.to_owned()).increment(1);
}

/// Record capacity evictions.
pub fn record_cache_evictions(count: u64) {
    counter!(METRIC_CACHE_EVICTIONS).increment(count);
}

/// Update cache size gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_cache_size(size: u64) {
    gauge!(METRIC_CACHE_SIZE).set(size as f64);
}
