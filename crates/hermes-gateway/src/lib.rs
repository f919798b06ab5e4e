//! # Hermes Gateway
//!
//! Gateway repositories and the processors routing requests through them.
//!
//! Gateways are published as JSON by a remote service. This crate fetches
//! and compiles them, picks the gateway of each request and forwards the
//! request where the gateway navigates:
//!
//! - [`Gateway`] / [`GatewayRepository`] / [`RepositoryJoined`] - First-fit gateway matching
//! - [`GatewayRepositoryHandler`] / [`AuthorizedRepositoryHandler`] - Repository providers
//! - [`GatewaySelector`] - Match selection with `404`/`405` error gateways
//! - [`GatewayFilter`] - Access checks through filter services
//! - [`ErrorPlacement`] - Error status placed on the request parameters
//! - [`GatewayForward`] - Forwarded request built from the navigate URI
//! - [`Fetcher`] / [`HttpFetcher`] - Remote JSON access
//! - [`CleanupScheduler`] - Periodic expiry of cached repositories
//!
//! ## Example
//!
//! ```ignore
//! use hermes_gateway::{GatewayRepositoryHandler, GatewaySelector, HttpFetcher};
//! use hermes_pipeline::{Assembly, Contextual};
//!
//! let fetcher = Arc::new(HttpFetcher::new(Some("http://localhost:8080/"), timeout)?);
//! let assembly = Assembly::new("gateway")
//!     .with(Contextual::new(GatewayRepositoryHandler::new("resources/Gateway", fetcher)))
//!     .with(Contextual::new(GatewaySelector::new()));
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-gateway/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod fetcher;
mod filter;
mod forward;
mod gateway;
mod placement;
mod provider;
mod repository;
mod scheduler;
mod selector;

use hermes_core::codes;
use hermes_core::ContextSpec;

pub use error::{GatewayError, GatewayResult};
pub use fetcher::{Fetched, Fetcher, HttpFetcher};
pub use filter::GatewayFilter;
pub use forward::{navigate, GatewayForward, Navigation};
pub use gateway::{
    format_groups, ErrorValue, Filter, Gateway, GatewayList, GatewayObject, Match, PutHeaders, Query,
};
pub use placement::ErrorPlacement;
pub use provider::{AuthorizedRepositoryHandler, GatewayRepositoryHandler};
pub use repository::{Cache, GatewayRepository, Repository, RepositoryJoined, SharedRepository};
pub use scheduler::{Cleanup, CleanupScheduler};
pub use selector::GatewaySelector;

/// Attribute names the gateway processors add to the HTTP contexts.
pub mod attributes {
    /// [`SharedRepository`](crate::SharedRepository) on the request.
    pub const REPOSITORY: &str = "repository";
    /// [`Match`](crate::Match) on the request.
    pub const MATCH: &str = "match";
    /// Allowed methods on the response, `BTreeSet<String>`.
    pub const ALLOWS: &str = "allows";
    /// Host of the forwarded request, `String`.
    pub const HOST: &str = "host";
}

/// The response attributes a status code is written to.
pub fn coded_response() -> ContextSpec {
    ContextSpec::new("Response")
        .defines::<String>(codes::attributes::CODE)
        .defines::<u16>(codes::attributes::STATUS)
        .defines::<bool>(codes::attributes::IS_SUCCESS)
        .defines::<String>(codes::attributes::TEXT)
}
