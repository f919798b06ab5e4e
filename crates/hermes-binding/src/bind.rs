//! Binding service calls to sessions.

use crate::error::{BindingError, BindingResult};
use crate::guard::{ScopeGuard, ScopedIter};
use crate::interceptor::{Interceptor, Invocation, Next, Returned};
use crate::session::{SessionCreator, SessionScope};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Runs service calls inside a session of one creator.
///
/// The session is opened on demand by the call. A successful call flushes,
/// expunges and commits it; a failed one rolls it back. Nested bound calls
/// share the session, and only the outermost one closes it.
#[derive(Clone)]
pub struct SessionBinder {
    creator: Arc<dyn SessionCreator>,
}

impl SessionBinder {
    /// Binds calls to sessions of `creator`.
    pub fn new(creator: Arc<dyn SessionCreator>) -> Self {
        Self { creator }
    }

    /// The session creator.
    pub fn creator(&self) -> &Arc<dyn SessionCreator> {
        &self.creator
    }

    /// Runs `f` in the scope.
    pub fn invoke<T, E>(&self, scope: &SessionScope, f: impl FnOnce(&SessionScope) -> Result<T, E>) -> Result<T, E>
    where
        E: From<BindingError>,
    {
        let guard = ScopeGuard::begin(scope, Arc::clone(&self.creator));
        match f(scope) {
            Ok(value) => {
                guard.commit()?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback) = guard.rollback() {
                    warn!(creator = self.creator.name(), error = %rollback, "Cannot roll back failed call");
                }
                Err(error)
            }
        }
    }

    /// Runs `f`, which returns a lazy iterator.
    ///
    /// The session check comes before the iterator check: if the call itself
    /// opened the session it is committed right away, before any item is
    /// pulled, and the iterator is passed through unscoped. Otherwise the
    /// scope stays begun until the iterator is exhausted, so the session
    /// opened while iterating is committed or rolled back with it.
    pub fn invoke_iter<I, T, E>(
        &self,
        scope: &SessionScope,
        f: impl FnOnce(&SessionScope) -> Result<I, E>,
    ) -> Result<ScopedIter<I>, E>
    where
        I: Iterator<Item = Result<T, E>>,
        E: From<BindingError>,
    {
        let guard = ScopeGuard::begin(scope, Arc::clone(&self.creator));
        match f(scope) {
            Ok(iter) => {
                if scope.has_session()? {
                    guard.commit()?;
                    Ok(ScopedIter::unscoped(iter))
                } else {
                    Ok(ScopedIter::new(iter, guard))
                }
            }
            Err(error) => {
                if let Err(rollback) = guard.rollback() {
                    warn!(creator = self.creator.name(), error = %rollback, "Cannot roll back failed call");
                }
                Err(error)
            }
        }
    }
}

impl fmt::Debug for SessionBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBinder").field("creator", &self.creator.name()).finish()
    }
}

impl Interceptor for SessionBinder {
    fn name(&self) -> &str {
        self.creator.name()
    }

    fn intercept(&self, invocation: &Invocation<'_>, next: Next<'_>) -> BindingResult<Returned> {
        let scope = invocation.scope.ok_or_else(|| BindingError::NoScope {
            service: invocation.service.to_string(),
            method: invocation.method.to_string(),
        })?;
        self.invoke(scope, |_| next.run(invocation))
    }
}
