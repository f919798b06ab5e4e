//! Error types for the gateway repositories.

use hermes_pipeline::ExecutionError;
use thiserror::Error;

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway-specific errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway JSON could not be decoded.
    #[error("Invalid gateway JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A gateway pattern is not a valid regex.
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        /// The pattern as received.
        pattern: String,
        /// Compilation failure.
        source: regex::Error,
    },

    /// A gateway error entry is not a status code.
    #[error("Invalid error value '{value}'")]
    ErrorValue {
        /// The value as received.
        value: String,
    },

    /// A put header is not of the `name:value` form.
    #[error("Invalid put header value '{value}'")]
    PutHeader {
        /// The value as received.
        value: String,
    },

    /// A URI template refers to a group the match does not have.
    #[error("Invalid URI '{template}' for {groups} groups")]
    Template {
        /// The template.
        template: String,
        /// Number of captured groups.
        groups: usize,
    },

    /// A navigate URI cannot be parsed.
    #[error("Invalid navigate URI '{uri}': {message}")]
    Navigate {
        /// The navigate URI after substitution.
        uri: String,
        /// Parse failure.
        message: String,
    },

    /// Fetching from a remote service failed.
    #[error("Fetch of '{uri}' failed: {message}")]
    Fetch {
        /// Fetched URI.
        uri: String,
        /// Failure description.
        message: String,
    },

    /// The cleanup scheduler is already running.
    #[error("Cleanup of '{name}' is already scheduled")]
    AlreadyScheduled {
        /// Scheduled target name.
        name: String,
    },
}

impl GatewayError {
    /// Creates a fetch error.
    #[must_use]
    pub fn fetch(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, groups: usize) -> Self {
        Self::Template {
            template: template.into(),
            groups,
        }
    }
}

impl From<GatewayError> for ExecutionError {
    fn from(error: GatewayError) -> Self {
        Self::Other(error.into())
    }
}
