//! # Hermes Telemetry
//!
//! Logging and metrics setup for Hermes services.
//!
//! The Hermes crates emit `tracing` events and `metrics` measurements
//! without installing anything. A service calls [`init_telemetry`] once at
//! startup:
//!
//! - [`init_logging`] / [`LogConfig`] - `tracing-subscriber` registry with JSON or pretty output
//! - [`init_metrics`] / [`MetricsConfig`] - Prometheus recorder and scrape endpoint
//! - [`TelemetryError`] - Setup failures
//!
//! # Example
//!
//! ```rust,ignore
//! use hermes_telemetry::{init_telemetry, LogConfig, MetricsConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     init_telemetry(&LogConfig::production(), &MetricsConfig::default())
//!         .expect("Failed to init telemetry");
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use self::logging::{init_logging, LogConfig};
pub use self::metrics::{describe_metrics, init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(logging: &LogConfig, metrics: &MetricsConfig) -> TelemetryResult<()> {
    init_logging(logging)?;
    init_metrics(metrics)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_telemetry() {
        let logging = LogConfig {
            enabled: false,
            ..LogConfig::default()
        };
        let metrics = MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        };
        assert!(init_telemetry(&logging, &metrics).is_ok());
    }
}
