//! Configuration section types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gateway section: where the gateways come from and how long they live.
///
/// # Example
///
/// ```
/// use hermes_config::GatewayConfig;
///
/// let config = GatewayConfig {
///     base_url: "http://resources:8081/".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.uri, "resources/Gateway");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the REST resources server the gateways are fetched from.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// URI of the anonymous gateways, relative to the base URL.
    #[serde(default = "default_uri")]
    pub uri: String,

    /// URI of the gateways of an authorization, with a `%s` marker where the
    /// authorization goes.
    #[serde(default = "default_authorized_uri")]
    pub authorized_uri: String,

    /// Request header carrying the authorization.
    #[serde(default = "default_authorization_header")]
    pub authorization_header: String,

    /// Interval in seconds between refreshes of the anonymous gateways.
    #[serde(default = "default_interval")]
    pub cleanup_interval_secs: u64,

    /// Inactivity in seconds after which the gateways of an authorization are
    /// dropped.
    #[serde(default = "default_interval")]
    pub cleanup_authorized_interval_secs: u64,

    /// Timeout in seconds of a remote fetch.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Seconds a filter answer stays cached.
    #[serde(default = "default_interval")]
    pub filter_cache_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            uri: default_uri(),
            authorized_uri: default_authorized_uri(),
            authorization_header: default_authorization_header(),
            cleanup_interval_secs: default_interval(),
            cleanup_authorized_interval_secs: default_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            filter_cache_secs: default_interval(),
        }
    }
}

impl GatewayConfig {
    /// Refresh interval of the anonymous gateways.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Inactivity timeout of the authorized gateways.
    pub fn cleanup_authorized_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_authorized_interval_secs)
    }

    /// Remote fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Filter answer lifetime.
    pub fn filter_cache(&self) -> Duration {
        Duration::from_secs(self.filter_cache_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:8081/".to_string()
}

fn default_uri() -> String {
    "resources/Gateway".to_string()
}

fn default_authorized_uri() -> String {
    "resources/Security/Login/%s/Gateway".to_string()
}

fn default_authorization_header() -> String {
    "Authorization".to_string()
}

fn default_interval() -> u64 {
    60
}

fn default_fetch_timeout() -> u64 {
    10
}

/// Indexing section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IndexingConfig {
    /// Largest chunk, in bytes, the modifier emits at once.
    #[serde(default = "default_maximum")]
    pub maximum: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            maximum: default_maximum(),
        }
    }
}

fn default_maximum() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.uri, "resources/Gateway");
        assert!(config.authorized_uri.contains("%s"));
        assert_eq!(config.authorization_header, "Authorization");
        assert_eq!(config.cleanup_interval(), Duration::from_secs(60));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_gateway_config_deserialize() {
        let toml = r#"
            uri = "api/Gateway"
            cleanup_interval_secs = 5
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.uri, "api/Gateway");
        assert_eq!(config.cleanup_interval_secs, 5);
        assert_eq!(config.filter_cache_secs, 60);
    }

    #[test]
    fn test_gateway_config_unknown_field_rejected() {
        let toml = r#"
            uri = "api/Gateway"
            refresh = 5
        "#;
        let result: Result<GatewayConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_indexing_config_default() {
        assert_eq!(IndexingConfig::default().maximum, 1024);
    }
}
