//! Runtime error types.

use hermes_core::AttrError;
use thiserror::Error;

/// Result type alias using [`ExecutionError`].
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Errors raised while a chain executes.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// A context a call needs is not in the chain arguments.
    #[error("Missing context '{name}' in the chain arguments")]
    MissingContext {
        /// Context name.
        name: String,
    },

    /// A chain argument is not of the expected kind.
    #[error("Chain argument '{name}' is not {expected}")]
    InvalidArgument {
        /// Argument name.
        name: String,
        /// What was expected.
        expected: &'static str,
    },

    /// Reading or writing a context attribute failed.
    #[error(transparent)]
    Attribute(#[from] AttrError),

    /// A finalizer tried to register another finalizer.
    #[error("Finalizers cannot register other finalizers")]
    FinalizerRegistration,

    /// A processor reported a failure.
    #[error("Processor '{processor}' failed: {message}")]
    Processor {
        /// Processor name.
        processor: String,
        /// Failure description.
        message: String,
    },

    /// Any other failure raised inside a processor.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecutionError {
    /// Creates a missing context error.
    #[must_use]
    pub fn missing_context(name: impl Into<String>) -> Self {
        Self::MissingContext { name: name.into() }
    }

    /// Creates a processor failure.
    #[must_use]
    pub fn processor(processor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processor {
            processor: processor.into(),
            message: message.into(),
        }
    }
}
