//! Placing the response error on the request parameters.

use crate::attributes::ALLOWS;
use hermes_core::codes::{self, METHOD_NOT_AVAILABLE};
use hermes_core::http::{names, request, response, Parameters};
use hermes_core::ContextSpec;
use hermes_pipeline::{BoxFuture, Chain, Contexts, ExecutionResult, Handler};
use std::collections::BTreeSet;

/// Appends the error status, and the allowed methods of a `405`, to the
/// request parameters so the error gateway can render them.
#[derive(Debug, Clone)]
pub struct ErrorPlacement {
    name_status: String,
    name_allow: String,
}

impl Default for ErrorPlacement {
    fn default() -> Self {
        Self {
            name_status: "status".to_string(),
            name_allow: "allow".to_string(),
        }
    }
}

impl ErrorPlacement {
    /// Creates the placement with the `status` and `allow` parameter names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the parameter name for the status.
    #[must_use]
    pub fn with_status_name(mut self, name: impl Into<String>) -> Self {
        self.name_status = name.into();
        self
    }

    /// Sets the parameter name for the allowed methods.
    #[must_use]
    pub fn with_allow_name(mut self, name: impl Into<String>) -> Self {
        self.name_allow = name.into();
        self
    }
}

impl Handler for ErrorPlacement {
    fn name(&self) -> &str {
        "gateway_error_placement"
    }

    fn contexts(&self) -> Contexts {
        Contexts::new()
            .with(
                names::REQUEST,
                ContextSpec::new("Request").defines::<Parameters>(request::PARAMETERS),
            )
            .with(
                names::RESPONSE,
                ContextSpec::new("Response")
                    .optional::<bool>(response::IS_SUCCESS)
                    .optional::<u16>(response::STATUS)
                    .optional::<BTreeSet<String>>(ALLOWS),
            )
    }

    fn process<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let request = chain.object(names::REQUEST)?;
            let response = chain.object(names::RESPONSE)?;
            if codes::response_is_success(&response) {
                return Ok(());
            }

            let status = response.get::<u16>(response::STATUS);
            let allows = match status {
                Some(status) if status == METHOD_NOT_AVAILABLE.status => {
                    response.get::<BTreeSet<String>>(ALLOWS).unwrap_or_default()
                }
                _ => BTreeSet::new(),
            };
            request.update::<Parameters, _>(request::PARAMETERS, |parameters| {
                if let Some(status) = status {
                    parameters.push((self.name_status.clone(), status.to_string()));
                }
                parameters.extend(allows.into_iter().map(|allow| (self.name_allow.clone(), allow)));
            })?;
            Ok(())
        })
    }
}
