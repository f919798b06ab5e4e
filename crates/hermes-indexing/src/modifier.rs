//! The index driven modification engine.
//!
//! [`ModifierByIndex`] walks the indexes of a [`Content`] in order. For each
//! index it streams the body up to where the block starts, registers the
//! default `first` actions, lets the [`Alter`] register more, registers the
//! default `last` actions, and then runs the registered actions. Whatever is
//! left after the last index is streamed as is, so content with no actions
//! comes out unchanged.
//!
//! The engine is a lazy iterator of byte packages; bulk reads are bounded by
//! the content maximum. The source stream is closed once the iteration ends,
//! successfully or not.

use crate::content::{Codec, Content, Provided};
use crate::error::IndexingResult;
use crate::escape::Escapes;
use crate::model::{Action, Index, Perform, Verb};
use crate::stream::ModifierStream;
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Named value stacks shared by the performs of a modification.
pub type Stacks = HashMap<String, Vec<Option<String>>>;

/// The modifier an [`Alter`] registers actions on.
pub trait Modifier {
    /// The index being modified.
    fn index(&self) -> &Index;

    /// Runs a non final action right away and returns what it emitted,
    /// decoded.
    fn fetch(&mut self, name: &str) -> IndexingResult<Option<String>>;

    /// Registers actions by name, in order, with an optional provided value.
    ///
    /// Returns `true` if at least one action was registered.
    fn register(&mut self, names: &[&str], value: Option<Provided>) -> bool;
}

/// Registers actions for each index.
pub trait Alter: Send + Sync {
    /// Registers actions on the modifier for its current index.
    fn alter(&self, modifier: &mut dyn Modifier) -> IndexingResult<()>;
}

/// An alter that registers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAlter;

impl Alter for NoAlter {
    fn alter(&self, _modifier: &mut dyn Modifier) -> IndexingResult<()> {
        Ok(())
    }
}

enum Pending {
    Feed { remaining: u64 },
    Rest,
    Stream { content: Content },
    Escaped { content: Content, escapes: Arc<Escapes>, output: Option<Bytes> },
    Nested(Box<ModifierByIndex>),
}

impl Pending {
    fn next_chunk(&mut self, outer: &mut Content) -> IndexingResult<Option<Bytes>> {
        match self {
            Self::Feed { remaining } => {
                if *remaining == 0 {
                    return Ok(None);
                }
                let count = usize::try_from(*remaining).map_or(outer.maximum, |r| r.min(outer.maximum));
                let pack = outer.source.read(count)?;
                if pack.is_empty() {
                    *remaining = 0;
                    return Ok(None);
                }
                *remaining -= pack.len() as u64;
                Ok(Some(Bytes::from(outer.codec.encode(&pack))))
            }
            Self::Rest => {
                let pack = outer.source.read(outer.maximum)?;
                if pack.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Bytes::from(outer.codec.encode(&pack))))
            }
            Self::Stream { content } => {
                let pack = content.source.read(outer.maximum)?;
                if pack.is_empty() {
                    content.source.close();
                    return Ok(None);
                }
                Ok(Some(Bytes::from(content.codec.encode(&pack))))
            }
            Self::Escaped {
                content,
                escapes,
                output,
            } => {
                // Characters and escape keys may straddle packages, so the
                // text is escaped whole and emitted in bounded packages.
                if output.is_none() {
                    let mut whole = Vec::new();
                    loop {
                        let pack = content.source.read(outer.maximum)?;
                        if pack.is_empty() {
                            break;
                        }
                        whole.extend_from_slice(&pack);
                    }
                    content.source.close();
                    let text = escapes.apply(&content.codec.decode(&whole));
                    *output = Some(Bytes::from(content.codec.encode_text(&text)));
                }
                let Some(output) = output.as_mut().filter(|output| !output.is_empty()) else {
                    return Ok(None);
                };
                Ok(Some(output.split_to(output.len().min(outer.maximum))))
            }
            Self::Nested(nested) => nested.next().transpose(),
        }
    }
}

enum Outcome {
    Nothing,
    Bytes(Bytes),
    Pending(Pending),
    Indexed(Content, Vec<String>),
}

fn offset(index: &Index, perform: &Perform) -> IndexingResult<u64> {
    let name = perform.index.as_deref().unwrap_or_default();
    index.offset_of(name)
}

fn length(index: &Index, perform: &Perform, source: &ModifierStream) -> IndexingResult<i128> {
    Ok(i128::from(offset(index, perform)?) - i128::from(source.tell()))
}

fn stack<'a>(values: &'a mut Stacks, perform: &Perform) -> &'a mut Vec<Option<String>> {
    values.entry(perform.name.clone().unwrap_or_default()).or_default()
}

fn execute(
    perform: &Perform,
    index: &Index,
    source: &mut ModifierStream,
    codec: &dyn Codec,
    value: Option<&Provided>,
    values: &mut Stacks,
    flags: &mut BTreeSet<String>,
) -> IndexingResult<Outcome> {
    if !perform.has_flags(flags) {
        return Ok(Outcome::Nothing);
    }
    let key = || perform.key.as_deref().and_then(|key| index.value(key)).map(ToString::to_string);
    let outcome = match perform.verb {
        Verb::Skip => {
            source.discard(offset(index, perform)?)?;
            Outcome::Nothing
        }
        Verb::Push => {
            let count = length(index, perform, source)?;
            let entry = match usize::try_from(count) {
                Ok(count) if count > 0 => Some(codec.decode(&source.read(count)?)),
                _ => None,
            };
            stack(values, perform).push(entry);
            Outcome::Nothing
        }
        Verb::PushValue => {
            stack(values, perform).push(perform.value.clone());
            Outcome::Nothing
        }
        Verb::PushKey => {
            stack(values, perform).push(key());
            Outcome::Nothing
        }
        Verb::Pop => {
            if let Some(stack) = perform.name.as_ref().and_then(|name| values.get_mut(name)) {
                stack.pop();
            }
            Outcome::Nothing
        }
        Verb::Feed => match u64::try_from(length(index, perform, source)?) {
            Ok(remaining) if remaining > 0 => Outcome::Pending(Pending::Feed { remaining }),
            _ => Outcome::Nothing,
        },
        Verb::FeedValue => perform
            .value
            .as_deref()
            .map_or(Outcome::Nothing, |text| Outcome::Bytes(Bytes::from(codec.encode_text(text)))),
        Verb::FeedKey => key().map_or(Outcome::Nothing, |text| Outcome::Bytes(Bytes::from(codec.encode_text(&text)))),
        Verb::FeedName => perform
            .name
            .as_ref()
            .and_then(|name| values.get(name))
            .and_then(|stack| stack.last())
            .and_then(|top| top.as_deref())
            .map_or(Outcome::Nothing, |text| Outcome::Bytes(Bytes::from(codec.encode_text(text)))),
        Verb::FeedContent => match value {
            Some(Provided::Text(text)) => {
                let text = match &perform.escapes {
                    Some(escapes) => escapes.apply(text),
                    None => text.to_string(),
                };
                Outcome::Bytes(Bytes::from(codec.encode_text(&text)))
            }
            Some(provided) => provided.take_content().map_or(Outcome::Nothing, |content| {
                Outcome::Pending(match &perform.escapes {
                    Some(escapes) => Pending::Escaped {
                        content,
                        escapes: Arc::clone(escapes),
                        output: None,
                    },
                    None => Pending::Stream { content },
                })
            }),
            None => Outcome::Nothing,
        },
        Verb::FeedIndexed => value
            .and_then(Provided::take_content)
            .map_or(Outcome::Nothing, |content| Outcome::Indexed(content, perform.actions.clone())),
        Verb::SetFlag => {
            flags.extend(perform.flags.iter().cloned());
            Outcome::Nothing
        }
        Verb::SetFlagIfBefore => {
            if !perform.flags.is_empty() && length(index, perform, source)? > 0 {
                flags.extend(perform.flags.iter().cloned());
            }
            Outcome::Nothing
        }
        Verb::SetFlagIfNotBefore => {
            if !perform.flags.is_empty() && length(index, perform, source)? <= 0 {
                flags.extend(perform.flags.iter().cloned());
            }
            Outcome::Nothing
        }
        Verb::RemFlag => {
            for flag in &perform.flags {
                flags.remove(flag);
            }
            Outcome::Nothing
        }
    };
    Ok(outcome)
}

fn prepared(action: &Action, value: Option<&Provided>) -> bool {
    action.performs().iter().all(|perform| {
        !perform.verb.needs_value()
            || match perform.verb {
                Verb::FeedIndexed => value.is_some_and(Provided::has_indexes),
                _ => value.is_some(),
            }
    })
}

struct Registered {
    action: usize,
    value: Option<Provided>,
}

struct Running {
    action: usize,
    perform: usize,
    value: Option<Provided>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Indexes,
    Tail,
    Done,
}

/// Modifies content according to its indexes.
///
/// # Example
///
/// ```ignore
/// let modified: Vec<Bytes> = ModifierByIndex::new(content, Arc::new(LinkAlter::new(base)))
///     .with_last(["adjust"])
///     .collect::<IndexingResult<_>>()?;
/// ```
pub struct ModifierByIndex {
    content: Content,
    alter: Arc<dyn Alter>,
    first: Vec<String>,
    last: Vec<String>,
    stage: Stage,
    next_index: usize,
    current: usize,
    entering: bool,
    registered: VecDeque<Registered>,
    triggered: HashSet<String>,
    is_final: bool,
    running: Option<Running>,
    pending: Option<Pending>,
    values: Stacks,
    flags: BTreeSet<String>,
}

impl ModifierByIndex {
    /// Creates the engine over the content.
    pub fn new(content: Content, alter: Arc<dyn Alter>) -> Self {
        Self {
            content,
            alter,
            first: Vec::new(),
            last: Vec::new(),
            stage: Stage::Indexes,
            next_index: 0,
            current: 0,
            entering: false,
            registered: VecDeque::new(),
            triggered: HashSet::new(),
            is_final: false,
            running: None,
            pending: None,
            values: Stacks::new(),
            flags: BTreeSet::new(),
        }
    }

    /// Actions registered first on every block.
    #[must_use]
    pub fn with_first<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.first = names.into_iter().map(Into::into).collect();
        self
    }

    /// Actions registered last on every block, nested content included.
    #[must_use]
    pub fn with_last<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.last = names.into_iter().map(Into::into).collect();
        self
    }

    /// The value stacks.
    pub fn stacks(&self) -> &Stacks {
        &self.values
    }

    /// The flags currently set.
    pub fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    fn nested(&self, content: Content, first: Vec<String>, values: Stacks) -> Self {
        let mut nested = Self::new(content, Arc::clone(&self.alter));
        nested.first = first;
        nested.last = self.last.clone();
        nested.values = values;
        nested
    }

    fn begin(&mut self, outcome: Outcome) -> Option<Bytes> {
        match outcome {
            Outcome::Nothing => None,
            Outcome::Bytes(bytes) => Some(bytes),
            Outcome::Pending(pending) => {
                self.pending = Some(pending);
                None
            }
            Outcome::Indexed(content, first) => {
                let values = std::mem::take(&mut self.values);
                self.pending = Some(Pending::Nested(Box::new(self.nested(content, first, values))));
                None
            }
        }
    }

    fn next_pending(&mut self) -> IndexingResult<Option<Bytes>> {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(None);
        };
        let chunk = pending.next_chunk(&mut self.content)?;
        if chunk.is_none() {
            if let Some(Pending::Nested(mut nested)) = self.pending.take() {
                self.values = std::mem::take(&mut nested.values);
            }
        }
        Ok(chunk)
    }

    fn enter(&mut self) -> IndexingResult<()> {
        self.entering = false;
        let first = self.first.clone();
        let last = self.last.clone();
        self.register_all(&first, None);
        let alter = Arc::clone(&self.alter);
        alter.alter(self)?;
        self.register_all(&last, None);
        debug!(
            block = self.index().block().name(),
            actions = self.registered.len(),
            "Modifying block"
        );
        Ok(())
    }

    fn register_all(&mut self, names: &[String], value: Option<Provided>) -> bool {
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.register(&names, value)
    }

    fn advance(&mut self) -> IndexingResult<Option<Bytes>> {
        if let Some(running) = self.running.as_mut() {
            let Content {
                source,
                codec,
                indexes,
                ..
            } = &mut self.content;
            let index = &indexes[self.current];
            let block = Arc::clone(index.block());
            let action = &block.actions()[running.action];
            if let Some(perform) = action.performs().get(running.perform) {
                running.perform += 1;
                let outcome = execute(
                    perform,
                    index,
                    source,
                    codec.as_ref(),
                    running.value.as_ref(),
                    &mut self.values,
                    &mut self.flags,
                )?;
                return Ok(self.begin(outcome));
            }
            if action.is_rewind() {
                source.rewind();
            }
            self.running = None;
            return Ok(None);
        }

        if let Some(registered) = self.registered.pop_front() {
            let block = Arc::clone(self.index().block());
            if block.actions()[registered.action].is_rewind() {
                self.content.source.record();
            }
            self.running = Some(Running {
                action: registered.action,
                perform: 0,
                value: registered.value,
            });
            return Ok(None);
        }

        if self.entering {
            self.enter()?;
            return Ok(None);
        }

        match self.stage {
            Stage::Indexes if self.next_index < self.content.indexes.len() => {
                self.current = self.next_index;
                self.next_index += 1;
                self.triggered.clear();
                self.is_final = false;
                self.entering = true;
                if let Some(start) = self.content.indexes[self.current].start() {
                    let remaining = start.saturating_sub(self.content.source.tell());
                    if remaining > 0 {
                        self.pending = Some(Pending::Feed { remaining });
                    }
                }
            }
            Stage::Indexes => {
                self.stage = Stage::Tail;
                self.pending = Some(Pending::Rest);
            }
            Stage::Tail => self.finish(),
            Stage::Done => {}
        }
        Ok(None)
    }

    fn finish(&mut self) {
        self.stage = Stage::Done;
        self.pending = None;
        self.running = None;
        self.registered.clear();
        self.content.source.close();
        trace!(indexes = self.content.indexes.len(), "Modification ended");
    }
}

impl Modifier for ModifierByIndex {
    fn index(&self) -> &Index {
        &self.content.indexes[self.current]
    }

    fn fetch(&mut self, name: &str) -> IndexingResult<Option<String>> {
        let block = Arc::clone(self.index().block());
        let Some(action) = block
            .actions()
            .iter()
            .find(|action| action.name() == name && !action.is_final())
        else {
            return Ok(None);
        };
        if !prepared(action, None) {
            return Ok(None);
        }

        let mut values = Stacks::new();
        let mut flags = BTreeSet::new();
        let mut output = Vec::new();
        if action.is_rewind() {
            self.content.source.record();
        }
        for perform in action.performs() {
            let outcome = {
                let Content {
                    source,
                    codec,
                    indexes,
                    ..
                } = &mut self.content;
                execute(
                    perform,
                    &indexes[self.current],
                    source,
                    codec.as_ref(),
                    None,
                    &mut values,
                    &mut flags,
                )?
            };
            let mut pending = match outcome {
                Outcome::Nothing => continue,
                Outcome::Bytes(bytes) => {
                    output.extend_from_slice(&bytes);
                    continue;
                }
                Outcome::Pending(pending) => pending,
                Outcome::Indexed(content, first) => {
                    Pending::Nested(Box::new(self.nested(content, first, std::mem::take(&mut values))))
                }
            };
            while let Some(chunk) = pending.next_chunk(&mut self.content)? {
                output.extend_from_slice(&chunk);
            }
            if let Pending::Nested(mut nested) = pending {
                values = std::mem::take(&mut nested.values);
            }
        }
        if action.is_rewind() {
            self.content.source.rewind();
        }
        Ok(Some(self.content.codec.decode(&output)))
    }

    fn register(&mut self, names: &[&str], value: Option<Provided>) -> bool {
        let block = Arc::clone(self.index().block());
        let mut registered = false;
        for name in names {
            if self.is_final {
                break;
            }
            for (position, action) in block.actions().iter().enumerate() {
                if action.name() != *name {
                    continue;
                }
                if !prepared(action, value.as_ref()) {
                    return registered;
                }
                for trigger in action.triggers() {
                    if !self.triggered.contains(trigger) {
                        self.register(&[trigger.as_str()], None);
                    }
                }
                self.triggered.insert(action.name().to_string());
                self.registered.push_back(Registered {
                    action: position,
                    value: value.clone(),
                });
                self.is_final = action.is_final();
                registered = true;
            }
        }
        registered
    }
}

impl Iterator for ModifierByIndex {
    type Item = IndexingResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.stage == Stage::Done {
                return None;
            }
            let step = if self.pending.is_some() {
                self.next_pending()
            } else {
                self.advance()
            };
            match step {
                Ok(Some(bytes)) if !bytes.is_empty() => return Some(Ok(bytes)),
                Ok(_) => {}
                Err(error) => {
                    debug!(error = %error, "Modification failed");
                    self.finish();
                    return Some(Err(error));
                }
            }
        }
    }
}

impl fmt::Debug for ModifierByIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierByIndex")
            .field("content", &self.content)
            .field("first", &self.first)
            .field("last", &self.last)
            .field("stage", &self.stage)
            .finish()
    }
}

/// Modifies the content, registering `defaults` last on every block.
pub fn iterate_modified(alter: Arc<dyn Alter>, content: Content, defaults: &[&str]) -> ModifierByIndex {
    ModifierByIndex::new(content, alter).with_last(defaults.iter().copied())
}

/// Drains a modification into a single buffer.
pub fn collect(modifier: ModifierByIndex) -> IndexingResult<Vec<u8>> {
    let mut output = Vec::new();
    for chunk in modifier {
        output.extend_from_slice(&chunk?);
    }
    Ok(output)
}
