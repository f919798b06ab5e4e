//! Configuration loader with layered approach.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::{ConfigError, HermesConfig};

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration file (TOML or JSON)
/// 3. `.env` file, loaded into the process environment
/// 4. Environment variables `PREFIX__SECTION__KEY`
///
/// # Example
///
/// ```no_run
/// use hermes_config::ConfigLoader;
///
/// # fn main() -> Result<(), hermes_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("hermes.toml")?
///     .with_dotenv()?
///     .with_env_prefix("HERMES")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: HermesConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader over the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: HermesConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = HermesConfig::development();
        self
    }

    /// Start with the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = HermesConfig::production();
        self
    }

    /// Load configuration from a file, TOML or JSON by extension.
    ///
    /// The file replaces the whole configuration; sections and fields it
    /// leaves out take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed or
    /// has unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
        self.config = match extension.as_deref() {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    format: path.display().to_string(),
                })
            }
        };
        debug!(path = %path.display(), "Configuration file loaded");
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`toml` or
    /// `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use hermes_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [gateway]
    ///     uri = "api/Gateway"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.gateway.uri, "api/Gateway");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    format: format.to_string(),
                })
            }
        };
        Ok(self)
    }

    /// Load the `.env` file of the working directory, if any, into the
    /// process environment. Variables already set are kept.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Dotenv` if the file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Environment file loaded"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Ok(self)
    }

    /// Load the given `.env` file into the process environment. Variables
    /// already set are kept.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Dotenv` if the file is missing or malformed.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Environment file loaded");
        Ok(self)
    }

    /// Set the environment variable prefix for overrides.
    ///
    /// With prefix `HERMES`, `HERMES__GATEWAY__URI=api/Gateway` overrides
    /// `gateway.uri`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply overrides from the given variables instead of the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EnvParseError` for a value of the wrong type.
    pub fn with_vars<I, K, V>(mut self, prefix: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let prefix = prefix.to_uppercase();
        let vars: BTreeMap<String, String> = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        for (key, value) in &vars {
            self.apply_env_var(key, value, &prefix)?;
        }
        Ok(self)
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or validation
    /// fails.
    pub fn load(mut self) -> Result<HermesConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: BTreeMap<String, String> = env::vars().filter(|(k, _)| k.starts_with(&prefix)).collect();
            for (key, value) in &vars {
                self.apply_env_var(key, value, &prefix)?;
            }
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> HermesConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["GATEWAY", "BASE_URL"] => config.gateway.base_url = value.to_string(),
            ["GATEWAY", "URI"] => config.gateway.uri = value.to_string(),
            ["GATEWAY", "AUTHORIZED_URI"] => config.gateway.authorized_uri = value.to_string(),
            ["GATEWAY", "AUTHORIZATION_HEADER"] => config.gateway.authorization_header = value.to_string(),
            ["GATEWAY", "CLEANUP_INTERVAL_SECS"] => config.gateway.cleanup_interval_secs = parse(key, value)?,
            ["GATEWAY", "CLEANUP_AUTHORIZED_INTERVAL_SECS"] => {
                config.gateway.cleanup_authorized_interval_secs = parse(key, value)?;
            }
            ["GATEWAY", "FETCH_TIMEOUT_SECS"] => config.gateway.fetch_timeout_secs = parse(key, value)?,
            ["GATEWAY", "FILTER_CACHE_SECS"] => config.gateway.filter_cache_secs = parse(key, value)?,

            ["INDEXING", "MAXIMUM"] => config.indexing.maximum = parse(key, value)?,

            ["LOGGING", "ENABLED"] => config.logging.enabled = parse_flag(key, value)?,
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "JSON_FORMAT"] => config.logging.json_format = parse_flag(key, value)?,
            ["LOGGING", "SPAN_EVENTS"] => config.logging.span_events = parse_flag(key, value)?,
            ["LOGGING", "FILE_LINE_INFO"] => config.logging.file_line_info = parse_flag(key, value)?,
            ["LOGGING", "THREAD_IDS"] => config.logging.thread_ids = parse_flag(key, value)?,
            ["LOGGING", "INCLUDE_TARGET"] => config.logging.include_target = parse_flag(key, value)?,

            ["METRICS", "ENABLED"] => config.metrics.enabled = parse_flag(key, value)?,
            ["METRICS", "ADDR"] => config.metrics.addr = value.to_string(),

            _ => debug!(key, "Unknown configuration variable ignored"),
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected a non-negative integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, HermesConfig::default());
    }

    #[test]
    fn test_loader_presets() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(!config.metrics.enabled);

        let config = ConfigLoader::new().with_production().load().unwrap();
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"gateway": {"authorization_header": "X-Auth"}, "indexing": {"maximum": 64}}"#;
        let config = ConfigLoader::new().with_string(json, "json").unwrap().load().unwrap();
        assert_eq!(config.gateway.authorization_header, "X-Auth");
        assert_eq!(config.indexing.maximum, 64);
    }

    #[test]
    fn test_loader_with_string_unknown_section() {
        let result = ConfigLoader::new().with_string("[server]\nport = 1", "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));

        let result = ConfigLoader::new().with_string("port: 1", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/hermes.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));

        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/hermes.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.gateway.uri, "resources/Gateway");
    }

    #[test]
    fn test_apply_env_vars() {
        let config = ConfigLoader::new()
            .with_vars(
                "test",
                [
                    ("TEST__GATEWAY__URI", "api/Gateway"),
                    ("TEST__GATEWAY__CLEANUP_INTERVAL_SECS", "15"),
                    ("TEST__LOGGING__JSON_FORMAT", "off"),
                    ("TEST__METRICS__ENABLED", "no"),
                    ("OTHER__GATEWAY__URI", "ignored"),
                ],
            )
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.gateway.uri, "api/Gateway");
        assert_eq!(config.gateway.cleanup_interval_secs, 15);
        assert!(!config.logging.json_format);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_apply_env_var_invalid_integer() {
        let result = ConfigLoader::new().with_vars("TEST", [("TEST__INDEXING__MAXIMUM", "lots")]);
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_overrides_are_validated() {
        let result = ConfigLoader::new()
            .with_vars("TEST", [("TEST__GATEWAY__AUTHORIZED_URI", "resources/Gateway")])
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
