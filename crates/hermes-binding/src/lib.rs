//! # Hermes Binding
//!
//! Session handling around service calls.
//!
//! Services open store sessions on demand. This crate scopes those sessions
//! to the calls and request flights that use them:
//!
//! - [`Session`] / [`SessionCreator`] - The store contract
//! - [`SessionScope`] - Per-flight sessions, one per creator, carried in the chain arguments
//! - [`ScopeGuard`] / [`ScopedIter`] - Commit or roll back when a call or an iteration ends
//! - [`SessionBinder`] - Service calls bound to sessions
//! - [`Binder`] / [`Interceptor`] - Cross-cutting code around service calls
//! - [`Transactional`] - One transaction per request flight
//!
//! ## Example
//!
//! ```ignore
//! use hermes_binding::{SessionBinder, SessionScope};
//!
//! let binder = SessionBinder::new(Arc::new(MyStore::connect(url)?));
//! let scope = SessionScope::new();
//! let id = binder.invoke(&scope, |scope| {
//!     scope.with_session(|session| insert(session, &article))?
//! })?;
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-binding/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bind;
mod error;
mod guard;
mod interceptor;
mod session;
mod transactional;

pub use bind::SessionBinder;
pub use error::{BindingError, BindingResult};
pub use guard::{ScopeGuard, ScopedIter};
pub use interceptor::{Binder, CallMetrics, Interceptor, Invocation, Next, Returned};
pub use session::{Closer, Session, SessionCreator, SessionScope};
pub use transactional::{input_error, session_scope, Transactional, ERROR_INPUT, SESSION_SCOPE};
