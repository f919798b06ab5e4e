//! Typed configuration system for Hermes.
//!
//! This crate provides a strongly-typed configuration for Hermes gateway
//! services with support for:
//! - TOML and JSON configuration files
//! - `.env` files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//!
//! # Overview
//!
//! [`HermesConfig`] holds every section:
//!
//! - [`GatewayConfig`] - Resources server, gateway URIs, refresh intervals
//! - [`IndexingConfig`] - Content indexing chunk size
//! - [`LogConfig`] - Logging
//! - [`MetricsConfig`] - Prometheus export
//!
//! # Example
//!
//! ```no_run
//! use hermes_config::ConfigLoader;
//!
//! # fn main() -> Result<(), hermes_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("hermes.toml")?
//!     .with_env_prefix("HERMES")
//!     .load()?;
//!
//! println!("Gateways come from: {}{}", config.gateway.base_url, config.gateway.uri);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [gateway]
//! base_url = "http://localhost:8081/"
//! uri = "resources/Gateway"
//! authorized_uri = "resources/Security/Login/%s/Gateway"
//! authorization_header = "Authorization"
//! cleanup_interval_secs = 60
//! cleanup_authorized_interval_secs = 60
//! fetch_timeout_secs = 10
//! filter_cache_secs = 60
//!
//! [indexing]
//! maximum = 1024
//!
//! [logging]
//! enabled = true
//! level = "info"
//! json_format = true
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__SECTION__KEY`. For example:
//!
//! - `HERMES__GATEWAY__BASE_URL=http://resources:8081/`
//! - `HERMES__INDEXING__MAXIMUM=4096`
//! - `HERMES__METRICS__ENABLED=false`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::HermesConfig;
pub use error::ConfigError;
pub use hermes_telemetry::{LogConfig, MetricsConfig};
pub use loader::ConfigLoader;
pub use schema::{GatewayConfig, IndexingConfig};
