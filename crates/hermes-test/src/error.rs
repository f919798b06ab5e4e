//! Test error types.

use hermes_core::AssemblyError;
use hermes_pipeline::ExecutionError;
use thiserror::Error;

/// Errors that can occur during testing.
#[derive(Debug, Error)]
pub enum TestError {
    /// The tested assembly could not be created.
    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    /// The flight failed with an unhandled error.
    #[error("Processing error: {0}")]
    Processing(#[from] ExecutionError),

    /// The processing does not generate a context the test needs.
    #[error("Missing context: {0}")]
    MissingContext(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using [`TestError`].
pub type TestResult<T> = Result<T, TestError>;
