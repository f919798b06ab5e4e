//! Request flights wrapped in a single transaction.

use crate::error::BindingError;
use crate::session::{Closer, SessionScope};
use hermes_core::codes::{self, INPUT_ERROR};
use hermes_core::http::{names, response};
use hermes_core::ContextSpec;
use hermes_pipeline::{
    Arg, ArgValue, BoxFuture, Chain, Contexts, ExecutionError, ExecutionResult, FnCall, Handler,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Arg bag entry holding the [`SessionScope`] of the flight.
pub const SESSION_SCOPE: &str = "session_scope";

/// Response attribute with the message of a handled input error, `String`.
pub const ERROR_INPUT: &str = "error_input";

/// The session scope of a flight, if one was opened.
pub fn session_scope(arg: &Arg) -> Option<SessionScope> {
    arg.value::<SessionScope>(SESSION_SCOPE).map(|scope| SessionScope::clone(&scope))
}

/// The message of a [`BindingError::Input`] anywhere in the error chain.
pub fn input_error(error: &ExecutionError) -> Option<&str> {
    let ExecutionError::Other(error) = error else {
        return None;
    };
    error.chain().find_map(|cause| match cause.downcast_ref::<BindingError>() {
        Some(BindingError::Input { message }) => Some(message.as_str()),
        _ => None,
    })
}

/// Keeps the sessions of the flight open until the chain finalizes.
///
/// Input errors raised by the calls after it become `400` responses and the
/// chain resumes. On finalization the sessions are committed when the
/// response is a success, or carries no success flag, and rolled back
/// otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct Transactional;

impl Transactional {
    /// Creates the processor.
    pub fn new() -> Self {
        Self
    }

    fn process_error(chain: &mut Chain) -> ExecutionResult<()> {
        let Some(message) = chain.error().and_then(input_error).map(str::to_string) else {
            return Ok(());
        };
        info!(chain = %chain.id(), error = %message, "Input error in transaction");
        let response = chain.object(names::RESPONSE)?;
        INPUT_ERROR.apply_with_text(&response, message.clone())?;
        response.set(ERROR_INPUT, message)?;
        chain.retry();
        Ok(())
    }

    fn process_finalize(chain: &mut Chain, scope: &SessionScope) -> ExecutionResult<()> {
        scope.set_keep_alive(false);
        let success = chain.error().is_none()
            && chain
                .object(names::RESPONSE)
                .map(|response| codes::response_is_success(&response))
                .unwrap_or(true);
        let closer = if success { Closer::Commit } else { Closer::Rollback };
        debug!(chain = %chain.id(), closer = ?closer, sessions = scope.open_sessions(), "Ending transaction");
        scope.end_sessions(closer)?;
        Ok(())
    }
}

impl Handler for Transactional {
    fn name(&self) -> &str {
        "transactional"
    }

    fn contexts(&self) -> Contexts {
        Contexts::new().with(
            names::RESPONSE,
            ContextSpec::new("Response")
                .defines::<String>(response::CODE)
                .defines::<u16>(response::STATUS)
                .defines::<bool>(response::IS_SUCCESS)
                .defines::<String>(response::TEXT)
                .defines::<String>(ERROR_INPUT),
        )
    }

    fn process<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let scope = match session_scope(chain.arg()) {
                Some(scope) => scope,
                None => {
                    let scope = SessionScope::new();
                    chain
                        .arg_mut()
                        .insert(SESSION_SCOPE, ArgValue::Value(Arc::new(scope.clone())));
                    scope
                }
            };
            scope.set_keep_alive(true);

            chain.on_error([FnCall::boxed("transactional_error", |chain: &mut Chain| {
                Box::pin(async move { Self::process_error(chain) })
            })]);
            chain.on_finalize([FnCall::boxed("transactional_finalize", move |chain: &mut Chain| {
                let scope = scope.clone();
                Box::pin(async move { Self::process_finalize(chain, &scope) })
            })])?;
            Ok(())
        })
    }
}
