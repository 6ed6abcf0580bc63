//! Metrics collection for account-service.
//!
//! HTTP metrics come from the shared `metrics` recorder; remote license
//! checks are tracked with dedicated Prometheus counters.

use metrics_exporter_prometheus::PrometheusHandle;
use prometheus::{IntCounterVec, IntGauge, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
static ACCOUNT_METRICS: OnceLock<AccountMetrics> = OnceLock::new();

struct AccountMetrics {
    registry: Registry,
    remote_sync_total: IntCounterVec,
    remote_fail_count: IntGauge,
    stats_push_total: IntCounterVec,
}

fn build() -> Result<AccountMetrics, prometheus::Error> {
    let registry = Registry::new();

    let remote_sync_total = IntCounterVec::new(
        Opts::new(
            "account_remote_sync_total",
            "Remote account synchronizations by outcome",
        ),
        &["outcome"],
    )?;

    let remote_fail_count = IntGauge::new(
        "account_remote_fail_count",
        "Consecutive failed remote account synchronizations",
    )?;

    let stats_push_total = IntCounterVec::new(
        Opts::new("account_stats_push_total", "Account stats pushes by status"),
        &["status"],
    )?;

    registry.register(Box::new(remote_sync_total.clone()))?;
    registry.register(Box::new(remote_fail_count.clone()))?;
    registry.register(Box::new(stats_push_total.clone()))?;

    Ok(AccountMetrics {
        registry,
        remote_sync_total,
        remote_fail_count,
        stats_push_total,
    })
}

/// Initialize metrics collection. Safe to call more than once.
pub fn init_metrics() -> Result<(), anyhow::Error> {
    METRICS_HANDLE.get_or_init(|| match service_core::middleware::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    });

    if ACCOUNT_METRICS.get().is_none() {
        let metrics = build()?;
        // Lost races keep the first registry.
        let _ = ACCOUNT_METRICS.set(metrics);
    }
    Ok(())
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .and_then(|h| h.as_ref())
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(metrics) = ACCOUNT_METRICS.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&metrics.registry.gather(), &mut buffer).ok();
        if let Ok(custom) = String::from_utf8(buffer) {
            output.push_str(&custom);
        }
    }

    output
}

/// Record the outcome of a remote synchronization.
pub fn record_remote_sync(outcome: &str, fail_count: u32) {
    if let Some(metrics) = ACCOUNT_METRICS.get() {
        metrics.remote_sync_total.with_label_values(&[outcome]).inc();
        metrics.remote_fail_count.set(i64::from(fail_count));
    }
}

pub fn record_stats_push(status: &str) {
    if let Some(metrics) = ACCOUNT_METRICS.get() {
        metrics.stats_push_total.with_label_values(&[status]).inc();
    }
}
