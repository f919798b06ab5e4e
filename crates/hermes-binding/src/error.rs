//! Error types for session binding.

use hermes_pipeline::ExecutionError;
use thiserror::Error;

/// Result type alias using [`BindingError`].
pub type BindingResult<T> = Result<T, BindingError>;

/// Binding errors.
#[derive(Debug, Error)]
pub enum BindingError {
    /// A session was requested outside any session creator scope.
    #[error("Invalid call, the scope is not tagged with a session creator")]
    NotTagged,

    /// A scope was ended more times than it was begun.
    #[error("Illegal end of scope, there is no session creator begun")]
    NotBegun,

    /// A bound call needs a session scope and got none.
    #[error("No session scope for '{service}.{method}'")]
    NoScope {
        /// Service name.
        service: String,
        /// Method name.
        method: String,
    },

    /// A session operation failed.
    #[error("Session of '{creator}' failed to {operation}: {message}")]
    Session {
        /// Creator name.
        creator: String,
        /// The failed operation.
        operation: &'static str,
        /// Failure description.
        message: String,
    },

    /// Invalid input detected by a service, reported to the client.
    #[error("{message}")]
    Input {
        /// Message for the client.
        message: String,
    },

    /// An interceptor replaced the returned value with one of another type.
    #[error("Call '{service}.{method}' returned an unexpected value")]
    Returned {
        /// Service name.
        service: String,
        /// Method name.
        method: String,
    },

    /// Any other failure of a bound service.
    #[error(transparent)]
    Service(#[from] anyhow::Error),
}

impl BindingError {
    /// Creates a session failure.
    #[must_use]
    pub fn session(creator: impl Into<String>, operation: &'static str, message: impl Into<String>) -> Self {
        Self::Session {
            creator: creator.into(),
            operation,
            message: message.into(),
        }
    }

    /// Creates an input error.
    #[must_use]
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }
}

impl From<BindingError> for ExecutionError {
    fn from(error: BindingError) -> Self {
        Self::Other(error.into())
    }
}
