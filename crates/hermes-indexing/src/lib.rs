//! # Hermes Indexing
//!
//! Byte-level modification of indexed content.
//!
//! Content arrives with indexes: block occurrences carrying named offsets
//! and literals. An [`Alter`] registers named [`Action`]s per index and the
//! [`ModifierByIndex`] engine runs their [`Perform`]s against the stream:
//!
//! - [`Block`] / [`Action`] / [`Perform`] - What can be done to a block
//! - [`Index`] / [`RawIndex`] - Where a block occurs in the content
//! - [`Content`] / [`Provided`] - Indexed streams and the values given to actions
//! - [`ModifierByIndex`] - Lazy, bounded modification engine
//! - [`Escapes`] - Single pass escaping of fed content
//! - [`ModifierStream`] - Rewindable source stream

#![doc(html_root_url = "https://docs.rs/hermes-indexing/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod content;
mod error;
mod escape;
mod model;
mod modifier;
pub mod perform;
mod stream;

pub use content::{Codec, Content, Provided, Utf8, DEFAULT_MAXIMUM};
pub use error::{IndexingError, IndexingResult};
pub use escape::Escapes;
pub use model::{Action, Block, Index, IndexValue, Perform, RawIndex, Verb};
pub use modifier::{collect, iterate_modified, Alter, Modifier, ModifierByIndex, NoAlter, Stacks};
pub use stream::ModifierStream;
