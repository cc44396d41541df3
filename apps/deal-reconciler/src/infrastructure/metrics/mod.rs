//! Prometheus Metrics Module
//!
//! # Metrics Categories
//!
//! - **Deals**: records received and malformed records dropped, per source
//! - **Streams**: open streams, reconnect attempts, exhausted retries
//! - **Fetches**: failed historical fetches
//! - **Reconciliation**: runs by outcome and run duration
//!
//! Recording is a no-op until [`init_metrics`] installs the recorder.

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::deal::DealSource;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics setup error.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The exporter could not be built.
    #[error("failed to build Prometheus exporter: {0}")]
    Build(#[from] metrics_exporter_prometheus::BuildError),

    /// Another recorder is already installed.
    #[error("failed to install metrics recorder: {0}")]
    Install(String),
}

/// Install the Prometheus recorder.
///
/// With `listen` set, a scrape endpoint is served on that address; this
/// must run inside a Tokio runtime. Repeated calls return the first handle.
pub fn init_metrics(listen: Option<SocketAddr>) -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let builder = PrometheusBuilder::new();
    let handle = match listen {
        Some(addr) => {
            let (recorder, exporter) = builder.with_http_listener(addr).build()?;
            let handle = recorder.handle();
            metrics::set_global_recorder(recorder)
                .map_err(|e| MetricsError::Install(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = exporter.await {
                    tracing::error!(error = ?e, "Prometheus exporter stopped");
                }
            });
            tracing::info!(%addr, "Prometheus scrape endpoint listening");
            handle
        }
        None => builder.install_recorder()?,
    };

    register_metrics();
    let _ = PROMETHEUS_HANDLE.set(handle.clone());
    Ok(handle)
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "deal_reconciler_deals_received_total",
        "Deals normalized from each source"
    );
    describe_counter!(
        "deal_reconciler_malformed_records_total",
        "Raw deal records or messages dropped as malformed"
    );

    describe_gauge!(
        "deal_reconciler_open_streams",
        "Live deal streams currently open"
    );
    describe_counter!(
        "deal_reconciler_stream_reconnects_total",
        "Automatic live stream reconnect attempts"
    );
    describe_counter!(
        "deal_reconciler_stream_retries_exhausted_total",
        "Live streams that gave up reconnecting"
    );

    describe_counter!(
        "deal_reconciler_fetch_failures_total",
        "Failed historical deal fetches"
    );

    describe_counter!(
        "deal_reconciler_reconciliation_runs_total",
        "Reconciliation runs by outcome"
    );
    describe_histogram!(
        "deal_reconciler_reconciliation_duration_seconds",
        "Wall time of a reconciliation run, fetches included"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for reconciliation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Report produced.
    Success,
    /// A fetch failed and no report was produced.
    Failed,
}

impl RunOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Record normalized deals.
pub fn record_deals_received(source: DealSource, count: u64) {
    counter!(
        "deal_reconciler_deals_received_total",
        "source" => source.as_str()
    )
    .increment(count);
}

/// Record dropped malformed records or messages.
pub fn record_malformed(source: DealSource, count: u64) {
    if count == 0 {
        return;
    }
    counter!(
        "deal_reconciler_malformed_records_total",
        "source" => source.as_str()
    )
    .increment(count);
}

/// A live stream opened.
pub fn stream_opened(source: DealSource) {
    gauge!("deal_reconciler_open_streams", "source" => source.as_str()).increment(1.0);
}

/// A live stream closed.
pub fn stream_closed(source: DealSource) {
    gauge!("deal_reconciler_open_streams", "source" => source.as_str()).decrement(1.0);
}

/// Record an automatic reconnect attempt.
pub fn record_reconnect(source: DealSource) {
    counter!(
        "deal_reconciler_stream_reconnects_total",
        "source" => source.as_str()
    )
    .increment(1);
}

/// Record a stream that exhausted its retries.
pub fn record_retries_exhausted(source: DealSource) {
    counter!(
        "deal_reconciler_stream_retries_exhausted_total",
        "source" => source.as_str()
    )
    .increment(1);
}

/// Record a failed historical fetch.
pub fn record_fetch_failure(source: DealSource) {
    counter!(
        "deal_reconciler_fetch_failures_total",
        "source" => source.as_str()
    )
    .increment(1);
}

/// Record a finished reconciliation run.
pub fn record_reconciliation(outcome: RunOutcome, duration: Duration) {
    counter!(
        "deal_reconciler_reconciliation_runs_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!("deal_reconciler_reconciliation_duration_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
