//! Prometheus metrics for Hermes.
//!
//! The crates record through the `metrics` facade; nothing is kept unless a
//! recorder is installed. [`init_metrics`] installs the Prometheus recorder
//! and serves the scrape endpoint.
//!
//! # Recorded Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `hermes_chain_executions_total` | Counter | - | Chains executed |
//! | `hermes_chain_errors_total` | Counter | - | Calls failing inside chains |
//! | `hermes_gateway_fetches_total` | Counter | - | Remote fetches |
//! | `hermes_gateway_fetch_duration_seconds` | Histogram | - | Remote fetch latency |
//! | `hermes_gateway_matches_total` | Counter | `outcome` | Gateway selections |
//! | `hermes_gateway_filter_denials_total` | Counter | - | Requests denied by filters |
//! | `hermes_binding_commits_total` | Counter | - | Sessions committed |
//! | `hermes_binding_rollbacks_total` | Counter | - | Sessions rolled back |
//! | `hermes_binding_calls_total` | Counter | `service`, `method`, `outcome` | Bound service calls |
//! | `hermes_binding_call_duration_seconds` | Histogram | `service`, `method` | Bound call latency |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::{error, info};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address of the scrape endpoint (e.g., "0.0.0.0:9090").
    pub addr: String,

    /// Histogram buckets for the `_seconds` metrics.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:9090".to_string(),
            duration_buckets: vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        }
    }
}

/// Installs the Prometheus recorder and spawns its HTTP listener.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` when there is no runtime or a recorder is
/// already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;
    let runtime = tokio::runtime::Handle::try_current().map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), &config.duration_buckets)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .build()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    let _ = METRICS_HANDLE.set(handle);

    runtime.spawn(async move {
        if let Err(e) = exporter.await {
            error!(error = ?e, "Metrics listener stopped");
        }
    });
    describe_metrics();
    info!(%addr, "Metrics listener started");
    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Registers the descriptions of the recorded metrics.
pub fn describe_metrics() {
    describe_counter!("hermes_chain_executions_total", "Total number of chains executed");
    describe_counter!("hermes_chain_errors_total", "Total number of calls failing inside chains");

    describe_counter!("hermes_gateway_fetches_total", "Total number of remote gateway fetches");
    describe_histogram!(
        "hermes_gateway_fetch_duration_seconds",
        Unit::Seconds,
        "Remote gateway fetch duration in seconds"
    );
    describe_counter!("hermes_gateway_matches_total", "Gateway selections by outcome");
    describe_counter!("hermes_gateway_filter_denials_total", "Requests denied by gateway filters");

    describe_counter!("hermes_binding_commits_total", "Total number of sessions committed");
    describe_counter!("hermes_binding_rollbacks_total", "Total number of sessions rolled back");
    describe_counter!("hermes_binding_calls_total", "Bound service calls by outcome");
    describe_histogram!(
        "hermes_binding_call_duration_seconds",
        Unit::Seconds,
        "Bound service call duration in seconds"
    );
}
