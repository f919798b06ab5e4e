//! Scope guards and iterators that keep a session open while consumed.

use crate::error::{BindingError, BindingResult};
use crate::session::{Closer, SessionCreator, SessionScope};
use std::sync::Arc;
use tracing::warn;

/// A creator begun on a scope, ended exactly once.
///
/// Dropping an unfinished guard rolls back.
#[must_use = "dropping the guard rolls the session back"]
pub struct ScopeGuard {
    scope: SessionScope,
    creator: String,
    finished: bool,
}

impl ScopeGuard {
    /// Begins `creator` on the scope.
    pub fn begin(scope: &SessionScope, creator: Arc<dyn SessionCreator>) -> Self {
        let name = creator.name().to_string();
        scope.begin_with(creator);
        Self {
            scope: scope.clone(),
            creator: name,
            finished: false,
        }
    }

    /// The guarded scope.
    pub fn scope(&self) -> &SessionScope {
        &self.scope
    }

    /// Flushes and expunges the session, if one was opened, then ends the
    /// creator with a commit. A failed flush rolls back instead.
    pub fn commit(mut self) -> BindingResult<()> {
        self.finished = true;
        if let Err(error) = self.scope.flush_current() {
            if let Err(rollback) = self.scope.end_current(Closer::Rollback) {
                warn!(creator = %self.creator, error = %rollback, "Cannot roll back after a failed flush");
            }
            return Err(error);
        }
        self.scope.end_current(Closer::Commit)
    }

    /// Ends the creator with a rollback.
    pub fn rollback(mut self) -> BindingResult<()> {
        self.finished = true;
        self.scope.end_current(Closer::Rollback)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(creator = %self.creator, "Session scope abandoned, rolling back");
        if let Err(error) = self.scope.end_current(Closer::Rollback) {
            warn!(creator = %self.creator, error = %error, "Cannot roll back abandoned scope");
        }
    }
}

/// Iterator over fallible items that holds a [`ScopeGuard`] until it ends.
///
/// Exhaustion commits; the first `Err` item rolls back and ends the
/// iteration after yielding it. Dropping the iterator early rolls back.
pub struct ScopedIter<I> {
    inner: I,
    guard: Option<ScopeGuard>,
    done: bool,
}

impl<I> ScopedIter<I> {
    /// Wraps `inner` so that `guard` ends with it.
    pub fn new(inner: I, guard: ScopeGuard) -> Self {
        Self {
            inner,
            guard: Some(guard),
            done: false,
        }
    }

    /// Wraps `inner` without any scope.
    pub fn unscoped(inner: I) -> Self {
        Self {
            inner,
            guard: None,
            done: false,
        }
    }

    /// Whether a scope is still held.
    pub fn is_scoped(&self) -> bool {
        self.guard.is_some()
    }
}

impl<I, T, E> Iterator for ScopedIter<I>
where
    I: Iterator<Item = Result<T, E>>,
    E: From<BindingError>,
{
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(item)) => Some(Ok(item)),
            Some(Err(error)) => {
                self.done = true;
                if let Some(Err(rollback)) = self.guard.take().map(ScopeGuard::rollback) {
                    warn!(error = %rollback, "Cannot roll back failed iteration");
                }
                Some(Err(error))
            }
            None => {
                self.done = true;
                match self.guard.take().map(ScopeGuard::commit) {
                    Some(Err(error)) => Some(Err(error.into())),
                    _ => None,
                }
            }
        }
    }
}
