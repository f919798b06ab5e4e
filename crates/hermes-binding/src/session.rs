//! Sessions and the scope that hands them out.
//!
//! A [`SessionScope`] belongs to one request flight and travels in the chain
//! argument bag. Service calls push their [`SessionCreator`] on the scope; the
//! first code asking for a session gets one from the creator on top, and the
//! same session is reused for that creator until the outermost call ends.

use crate::error::{BindingError, BindingResult};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A unit of work against a store.
pub trait Session: Send + 'static {
    /// Pushes pending changes to the store without ending the unit.
    fn flush(&mut self) -> BindingResult<()> {
        Ok(())
    }

    /// Detaches every loaded entity from the session.
    fn expunge_all(&mut self) {}

    /// Makes the changes permanent.
    fn commit(&mut self) -> BindingResult<()>;

    /// Discards the changes.
    fn rollback(&mut self) -> BindingResult<()>;
}

/// Creates sessions on demand.
pub trait SessionCreator: Send + Sync + 'static {
    /// Identity of the creator; a scope keeps one session per name.
    fn name(&self) -> &str;

    /// Opens a new session.
    fn create(&self) -> BindingResult<Box<dyn Session>>;
}

/// What happens to sessions when their scope ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closer {
    /// Commit each session.
    Commit,
    /// Roll each session back.
    Rollback,
    /// Drop the sessions as they are.
    Discard,
}

impl Closer {
    fn close(self, creator: &str, session: &mut dyn Session) -> BindingResult<()> {
        match self {
            Self::Commit => {
                metrics::counter!("hermes_binding_commits_total").increment(1);
                session.commit()
            }
            Self::Rollback => {
                metrics::counter!("hermes_binding_rollbacks_total").increment(1);
                session.rollback()
            }
            Self::Discard => {
                debug!(creator, "Session discarded");
                Ok(())
            }
        }
    }
}

#[derive(Default)]
struct ScopeState {
    creators: Vec<Arc<dyn SessionCreator>>,
    sessions: IndexMap<String, Box<dyn Session>>,
    keep_alive: bool,
}

/// The sessions of a request flight.
///
/// Clones share the same state. Closures handed to
/// [`with_session`](Self::with_session) must not call back into the scope.
#[derive(Clone, Default)]
pub struct SessionScope {
    state: Arc<Mutex<ScopeState>>,
}

impl SessionScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `creator` the source of sessions until the matching
    /// [`end_current`](Self::end_current).
    pub fn begin_with(&self, creator: Arc<dyn SessionCreator>) {
        debug!(creator = creator.name(), "Session creator begun");
        self.state.lock().creators.push(creator);
    }

    /// Number of creators begun and not ended.
    pub fn depth(&self) -> usize {
        self.state.lock().creators.len()
    }

    /// Keeps the sessions open when the outermost creator ends; some other
    /// code becomes responsible for [`end_sessions`](Self::end_sessions).
    pub fn set_keep_alive(&self, keep: bool) {
        self.state.lock().keep_alive = keep;
    }

    /// Whether the sessions outlive the outermost creator.
    pub fn is_keep_alive(&self) -> bool {
        self.state.lock().keep_alive
    }

    /// Runs `f` with the session of the current creator, opening it first if
    /// needed.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut dyn Session) -> R) -> BindingResult<R> {
        let mut state = self.state.lock();
        let creator = Arc::clone(state.creators.last().ok_or(BindingError::NotTagged)?);
        if !state.sessions.contains_key(creator.name()) {
            let session = creator.create()?;
            debug!(creator = creator.name(), "Session opened");
            state.sessions.insert(creator.name().to_string(), session);
        }
        match state.sessions.get_mut(creator.name()) {
            Some(session) => Ok(f(session.as_mut())),
            None => Err(BindingError::NotTagged),
        }
    }

    /// Whether the current creator already opened its session.
    pub fn has_session(&self) -> BindingResult<bool> {
        let state = self.state.lock();
        let creator = state.creators.last().ok_or(BindingError::NotTagged)?;
        Ok(state.sessions.contains_key(creator.name()))
    }

    /// Flushes the session of the current creator, if it has one, and
    /// expunges it.
    pub fn flush_current(&self) -> BindingResult<()> {
        if !self.has_session()? {
            return Ok(());
        }
        self.with_session(|session| {
            session.flush()?;
            session.expunge_all();
            Ok(())
        })?
    }

    /// Commits the session of the current creator right away.
    ///
    /// Returns whether there was a session to commit.
    pub fn commit_now(&self) -> BindingResult<bool> {
        let mut state = self.state.lock();
        let Some(creator) = state.creators.last().map(|creator| creator.name().to_string()) else {
            return Ok(false);
        };
        match state.sessions.get_mut(&creator) {
            Some(session) => {
                Closer::Commit.close(&creator, session.as_mut())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Ends the current creator. Ending the outermost one closes every
    /// session unless the scope is kept alive.
    pub fn end_current(&self, closer: Closer) -> BindingResult<()> {
        let outermost = {
            let mut state = self.state.lock();
            let creator = state.creators.pop().ok_or(BindingError::NotBegun)?;
            debug!(creator = creator.name(), remaining = state.creators.len(), "Session creator ended");
            state.creators.is_empty() && !state.keep_alive
        };
        if outermost {
            self.end_sessions(closer)?;
        }
        Ok(())
    }

    /// Closes every open session, the last opened first.
    ///
    /// All sessions are closed even if some fail; the first failure is
    /// returned.
    pub fn end_sessions(&self, closer: Closer) -> BindingResult<()> {
        let sessions: Vec<(String, Box<dyn Session>)> = self.state.lock().sessions.drain(..).rev().collect();
        let mut failure = None;
        for (creator, mut session) in sessions {
            if let Err(error) = closer.close(&creator, session.as_mut()) {
                warn!(creator = %creator, closer = ?closer, error = %error, "Cannot close session");
                failure.get_or_insert(error);
            }
        }
        failure.map_or(Ok(()), Err)
    }

    /// Number of open sessions.
    pub fn open_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }
}

impl fmt::Debug for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SessionScope")
            .field("creators", &state.creators.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("sessions", &state.sessions.keys().collect::<Vec<_>>())
            .field("keep_alive", &state.keep_alive)
            .finish()
    }
}
