//! # Hermes
//!
//! **Processor assemblies and REST gateway routing**
//!
//! Hermes builds request handling out of small processors that declare the
//! context attributes they require, define and produce:
//!
//! - **Typed Contexts** – Attribute declarations merged across processors and checked at assembly time
//! - **Chained Execution** – Ordered calls with error and finalizer stacks, branches and sub-assemblies
//! - **Gateway Routing** – Remote gateway repositories, first-fit matching, filters and forwarding
//! - **Content Indexing** – Streaming modification of indexed content
//! - **Session Binding** – Transactional session scopes around service calls
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hermes::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("hermes.toml")?
//!         .with_dotenv()?
//!         .with_env_prefix("HERMES")
//!         .load()?;
//!     init_telemetry(&config.logging, &config.metrics)?;
//!
//!     let service = GatewayService::from_config(&config.gateway)?;
//!     service.start()?;
//!     let processing = service.assembly(backend()).create(&server_contexts)?;
//!     // feed each request through `processing.execute(arg)`
//!     Ok(())
//! }
//! ```
//!
//! ## Flight
//!
//! ```text
//! Request → Repository → Authorized → Selector → Filter → ErrorPlacement → Forward → backend
//! ```

#![doc(html_root_url = "https://docs.rs/hermes/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod service;

pub use service::GatewayService;

// Re-export core types
pub use hermes_core as core;

// Re-export pipeline types
pub use hermes_pipeline as pipeline;

// Re-export indexing types
pub use hermes_indexing as indexing;

// Re-export gateway types
pub use hermes_gateway as gateway;

// Re-export binding types
pub use hermes_binding as binding;

// Re-export configuration types
pub use hermes_config as config;

// Re-export telemetry setup
pub use hermes_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use hermes::prelude::*;
/// ```
pub mod prelude {
    pub use crate::GatewayService;

    pub use hermes_core::{Code, ContextObject, ContextSpec};

    pub use hermes_pipeline::{
        Arg, Assembly, BoxFuture, Brancher, Chain, Contexts, Contextual, ExecutionError, ExecutionResult,
        Handler, Processing, Routing,
    };

    pub use hermes_gateway::{Fetcher, GatewayError, GatewayResult, HttpFetcher};

    pub use hermes_binding::{Session, SessionCreator, SessionScope, Transactional};

    pub use hermes_config::{ConfigError, ConfigLoader, HermesConfig};

    pub use hermes_telemetry::{init_telemetry, LogConfig, MetricsConfig};
}
