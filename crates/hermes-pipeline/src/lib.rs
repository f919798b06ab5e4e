//! # Hermes Pipeline
//!
//! Assembly compilation and chained execution for Hermes.
//!
//! This crate turns ordered processors into an executable [`Processing`]:
//!
//! - [`Assembly`] - Ordered, editable list of processors
//! - [`Processor`] / [`Registry`] - Registration contract used at build time
//! - [`Resolvers`] - Merged attribute declarations per context
//! - [`Processing`] / [`Chain`] - Compiled calls and the per-flight execution state
//! - [`Handler`] / [`Contextual`] - Plain handlers adapted into processors
//! - [`BranchingHandler`] / [`Brancher`] / [`Branch`] - Handlers owning sub-assemblies
//! - [`Mapping`] - Context renaming used by [`Renamer`] and [`Combine`]
//! - [`ExecutionError`] - Runtime failures

#![doc(html_root_url = "https://docs.rs/hermes-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod assembly;
mod branch;
mod error;
mod execution;
mod handler;
mod mapping;
mod processor;
mod report;
mod resolvers;

pub use assembly::Assembly;
pub use branch::{Branch, Combine, Included, Routing, Using};
pub use error::{ExecutionError, ExecutionResult};
pub use execution::{
    Arg, ArgValue, BoxFuture, BoxedCall, Call, Chain, FnCall, Processing, CANCELED, CONSUMED,
    EXCEPTION,
};
pub use handler::{
    Brancher, BranchingHandler, Composite, Contextual, Handler, Joiner, Renamer, RoutingHandler,
};
pub use mapping::Mapping;
pub use processor::{BoxedProcessor, Processor, Registry};
pub use report::Report;
pub use resolvers::{is_class_name, AttributeNames, Contexts, Resolvers};
