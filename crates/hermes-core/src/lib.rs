//! # Hermes Core
//!
//! Foundational types for the Hermes processing pipeline.
//!
//! This crate provides the context model every processor is declared against:
//!
//! - [`Attribute`] - Statused, typed attribute declaration with merge/solve algebra
//! - [`Status`] - DEFINED / REQUIRED / OPTIONAL attribute statuses
//! - [`TypeSet`] - Set of acceptable value types for an attribute
//! - [`ContextSpec`] - Definition-only context used during assembly validation
//! - [`ContextClass`] / [`ContextObject`] - Generated runtime contexts
//! - [`Code`] - Coded HTTP statuses flown through the pipeline
//! - [`AttrError`], [`ResolverError`], [`ProcessorError`], [`AssemblyError`] - Build-time errors
//!
//! The canonical request/response contexts live in [`http`].

#![doc(html_root_url = "https://docs.rs/hermes-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod attribute;
pub mod codes;
mod context;
mod error;
pub mod http;

pub use attribute::{AttrType, Attribute, Status, TypeSet, Usage};
pub use codes::Code;
pub use context::{ContextClass, ContextObject, ContextSpec, Descriptor};
pub use error::{
    AssemblyError, AssemblyResult, AttrError, AttrResult, ProcessorError, ResolverError,
};
