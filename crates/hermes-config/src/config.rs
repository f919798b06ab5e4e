//! The root configuration type.

use crate::{ConfigError, GatewayConfig, IndexingConfig};
use hermes_telemetry::logging::create_env_filter;
use hermes_telemetry::{LogConfig, MetricsConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Complete Hermes gateway service configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use hermes_config::HermesConfig;
///
/// let config = HermesConfig::default();
/// assert_eq!(config.gateway.uri, "resources/Gateway");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct HermesConfig {
    /// Gateway repositories and processors.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Content indexing.
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LogConfig,

    /// Metrics export.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl HermesConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gateway = &self.gateway;
        if !(gateway.base_url.starts_with("http://") || gateway.base_url.starts_with("https://")) {
            return Err(ConfigError::invalid_value(
                "gateway.base_url",
                format!("expected an http or https URL: {}", gateway.base_url),
            ));
        }
        if gateway.uri.is_empty() {
            return Err(ConfigError::invalid_value("gateway.uri", "must not be empty"));
        }
        if gateway.authorized_uri.matches("%s").count() != 1 {
            return Err(ConfigError::invalid_value(
                "gateway.authorized_uri",
                "must contain the '%s' marker exactly once",
            ));
        }
        if gateway.authorization_header.trim().is_empty() {
            return Err(ConfigError::invalid_value("gateway.authorization_header", "must not be empty"));
        }
        for (field, value) in [
            ("gateway.cleanup_interval_secs", gateway.cleanup_interval_secs),
            ("gateway.cleanup_authorized_interval_secs", gateway.cleanup_authorized_interval_secs),
            ("gateway.fetch_timeout_secs", gateway.fetch_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid_value(field, "must be at least one second"));
            }
        }

        if self.indexing.maximum == 0 {
            return Err(ConfigError::invalid_value("indexing.maximum", "must be at least one byte"));
        }

        if self.logging.enabled {
            create_env_filter(&self.logging.level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        if self.metrics.enabled && self.metrics.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "metrics.addr",
                format!("invalid socket address: {}", self.metrics.addr),
            ));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs, no metrics listener, short
    /// refresh intervals.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging = LogConfig::development();
        config.metrics.enabled = false;
        config.gateway.cleanup_interval_secs = 10;
        config.gateway.filter_cache_secs = 10;
        config
    }

    /// Production preset: JSON logs and the metrics listener.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging = LogConfig::production();
        config.metrics.enabled = true;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(HermesConfig::default().validate().is_ok());
        assert!(HermesConfig::development().validate().is_ok());
        assert!(HermesConfig::production().validate().is_ok());
    }

    #[test]
    fn test_authorized_uri_needs_marker() {
        let mut config = HermesConfig::default();
        config.gateway.authorized_uri = "resources/Security/Gateway".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "gateway.authorized_uri"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = HermesConfig::default();
        config.gateway.fetch_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gateway.fetch_timeout_secs"));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = HermesConfig::default();
        config.metrics.addr = "somewhere".to_string();
        assert!(config.validate().is_err());

        config.metrics.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = HermesConfig::default();
        config.logging.level = "hermes=loudest".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }
}
