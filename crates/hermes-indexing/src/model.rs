//! Blocks, actions, performs and indexes.

use crate::error::{IndexingError, IndexingResult};
use crate::escape::Escapes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// What a perform does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Discard the stream up to an index offset.
    Skip,
    /// Read up to an index offset and push the decoded text on a stack.
    Push,
    /// Push a literal.
    PushValue,
    /// Push a block key value.
    PushKey,
    /// Pop a stack.
    Pop,
    /// Stream up to an index offset.
    Feed,
    /// Emit a literal.
    FeedValue,
    /// Emit a block key value.
    FeedKey,
    /// Emit the top of a stack.
    FeedName,
    /// Stream a provided content.
    FeedContent,
    /// Stream a provided indexed content, modifying it as well.
    FeedIndexed,
    /// Set flags.
    SetFlag,
    /// Set flags if the stream is strictly before an index offset.
    SetFlagIfBefore,
    /// Set flags if the stream is at or after an index offset.
    SetFlagIfNotBefore,
    /// Remove flags.
    RemFlag,
}

impl Verb {
    /// Whether the perform flags gate the perform rather than being its
    /// payload.
    pub fn is_gated(self) -> bool {
        !matches!(
            self,
            Self::SetFlag | Self::SetFlagIfBefore | Self::SetFlagIfNotBefore | Self::RemFlag
        )
    }

    /// Whether the perform needs a provided value to be prepared.
    pub fn needs_value(self) -> bool {
        matches!(self, Self::FeedContent | Self::FeedIndexed)
    }
}

/// A single step of an action.
///
/// Create performs with the builders in [`crate::perform`].
#[derive(Debug, Clone, PartialEq)]
pub struct Perform {
    pub(crate) verb: Verb,
    pub(crate) flags: BTreeSet<String>,
    pub(crate) index: Option<String>,
    pub(crate) key: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) value: Option<String>,
    pub(crate) actions: Vec<String>,
    pub(crate) escapes: Option<Arc<Escapes>>,
}

impl Perform {
    pub(crate) fn new(verb: Verb) -> Self {
        Self {
            verb,
            flags: BTreeSet::new(),
            index: None,
            key: None,
            name: None,
            value: None,
            actions: Vec::new(),
            escapes: None,
        }
    }

    /// Only performs when all the flags are set; for flag verbs these are
    /// the flags to modify instead.
    #[must_use]
    pub fn when<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// The verb.
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// The flags.
    pub fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    /// The index value name.
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub(crate) fn has_flags(&self, flags: &BTreeSet<String>) -> bool {
        !self.verb.is_gated() || self.flags.is_subset(flags)
    }
}

/// A named sequence of performs.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    name: String,
    performs: Vec<Perform>,
    before: Vec<String>,
    is_final: bool,
    rewind: bool,
}

impl Action {
    /// Creates a final action.
    #[must_use]
    pub fn new(name: impl Into<String>, performs: Vec<Perform>) -> Self {
        Self {
            name: name.into(),
            performs,
            before: Vec::new(),
            is_final: true,
            rewind: false,
        }
    }

    /// Actions to trigger before this one, once per block.
    #[must_use]
    pub fn before<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.before.extend(names.into_iter().map(Into::into));
        self
    }

    /// Allows later actions in the block.
    #[must_use]
    pub fn non_final(mut self) -> Self {
        self.is_final = false;
        self
    }

    /// Re-streams the bytes read by the action once it completes.
    #[must_use]
    pub fn rewinding(mut self) -> Self {
        self.rewind = true;
        self
    }

    /// The action name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The performs in order.
    pub fn performs(&self) -> &[Perform] {
        &self.performs
    }

    /// The triggered actions.
    pub fn triggers(&self) -> &[String] {
        &self.before
    }

    /// Whether no other action may follow.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Whether the stream is rewound after the action.
    pub fn is_rewind(&self) -> bool {
        self.rewind
    }
}

/// A named set of actions, with the keys resolved at each index.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    name: String,
    actions: Vec<Action>,
    keys: Vec<String>,
    indexes: Vec<String>,
}

impl Block {
    /// Creates a block.
    #[must_use]
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        let indexes: BTreeSet<String> = actions
            .iter()
            .flat_map(|action| action.performs.iter())
            .filter_map(|perform| perform.index.clone())
            .collect();
        Self {
            name: name.into(),
            actions,
            keys: Vec::new(),
            indexes: indexes.into_iter().collect(),
        }
    }

    /// Declares the block keys.
    #[must_use]
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// The block name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The actions.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// The key names.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The index names used by the performs, sorted.
    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }
}

/// An index value: an absolute offset or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
    /// Absolute byte offset in the body.
    Offset(u64),
    /// Literal text.
    Text(String),
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset(offset) => write!(f, "{offset}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// The external form of an index, as emitted by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIndex {
    /// Block name.
    pub block: String,
    /// Values by name.
    pub values: IndexMap<String, IndexValue>,
}

/// A block occurrence in the content.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    block: Arc<Block>,
    values: IndexMap<String, IndexValue>,
}

impl Index {
    /// Creates an index with no values.
    #[must_use]
    pub fn new(block: Arc<Block>) -> Self {
        Self {
            block,
            values: IndexMap::new(),
        }
    }

    /// Resolves a raw index against the known blocks.
    pub fn resolve(raw: RawIndex, blocks: &HashMap<String, Arc<Block>>) -> IndexingResult<Self> {
        let block = blocks
            .get(&raw.block)
            .cloned()
            .ok_or(IndexingError::UnknownBlock { name: raw.block })?;
        Ok(Self {
            block,
            values: raw.values,
        })
    }

    /// Adds an offset value.
    #[must_use]
    pub fn offset(mut self, name: impl Into<String>, offset: u64) -> Self {
        self.values.insert(name.into(), IndexValue::Offset(offset));
        self
    }

    /// Adds a literal value.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.values.insert(name.into(), IndexValue::Text(text.into()));
        self
    }

    /// The block.
    pub fn block(&self) -> &Arc<Block> {
        &self.block
    }

    /// A value by name.
    pub fn value(&self, name: &str) -> Option<&IndexValue> {
        self.values.get(name)
    }

    /// Every value.
    pub fn values(&self) -> &IndexMap<String, IndexValue> {
        &self.values
    }

    /// The smallest offset, where the indexed block starts.
    pub fn start(&self) -> Option<u64> {
        self.values
            .values()
            .filter_map(|value| match value {
                IndexValue::Offset(offset) => Some(*offset),
                IndexValue::Text(_) => None,
            })
            .min()
    }

    /// The offset under a name.
    pub(crate) fn offset_of(&self, name: &str) -> IndexingResult<u64> {
        match self.values.get(name) {
            Some(IndexValue::Offset(offset)) => Ok(*offset),
            Some(IndexValue::Text(_)) => Err(IndexingError::NotAnOffset {
                block: self.block.name.clone(),
                name: name.to_string(),
            }),
            None => Err(IndexingError::MissingIndexValue {
                block: self.block.name.clone(),
                name: name.to_string(),
            }),
        }
    }
}
