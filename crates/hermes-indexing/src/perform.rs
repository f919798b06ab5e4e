//! Builders for the standard performs.
//!
//! Gate any perform on flags with [`Perform::when`]:
//!
//! ```ignore
//! let action = Action::new("replace", vec![
//!     skip("start"),
//!     feed_key("name").when(["adjust"]),
//!     skip("end"),
//! ]);
//! ```

use crate::escape::Escapes;
use crate::model::{Perform, Verb};
use std::sync::Arc;

fn indexed(verb: Verb, index: &str) -> Perform {
    let mut perform = Perform::new(verb);
    perform.index = Some(index.to_string());
    perform
}

fn named(verb: Verb, name: &str) -> Perform {
    let mut perform = Perform::new(verb);
    perform.name = Some(name.to_string());
    perform
}

/// Discards the stream up to the index; nothing happens if already past it.
pub fn skip(index: &str) -> Perform {
    indexed(Verb::Skip, index)
}

/// Reads the stream up to the index and pushes the decoded text on the
/// named stack; pushes an empty entry if already past it.
pub fn push(name: &str, index: &str) -> Perform {
    let mut perform = indexed(Verb::Push, index);
    perform.name = Some(name.to_string());
    perform
}

/// Pushes a literal on the named stack.
pub fn push_value(name: &str, value: &str) -> Perform {
    let mut perform = named(Verb::PushValue, name);
    perform.value = Some(value.to_string());
    perform
}

/// Pushes the value of a block key on the named stack.
pub fn push_key(name: &str, key: &str) -> Perform {
    let mut perform = named(Verb::PushKey, name);
    perform.key = Some(key.to_string());
    perform
}

/// Pops the named stack.
pub fn pop(name: &str) -> Perform {
    named(Verb::Pop, name)
}

/// Streams up to the index; nothing happens if already past it.
pub fn feed(index: &str) -> Perform {
    indexed(Verb::Feed, index)
}

/// Emits a literal.
pub fn feed_value(value: &str) -> Perform {
    let mut perform = Perform::new(Verb::FeedValue);
    perform.value = Some(value.to_string());
    perform
}

/// Emits the value of a block key.
pub fn feed_key(key: &str) -> Perform {
    let mut perform = Perform::new(Verb::FeedKey);
    perform.key = Some(key.to_string());
    perform
}

/// Emits the top of the named stack.
pub fn feed_name(name: &str) -> Perform {
    named(Verb::FeedName, name)
}

/// Streams the content provided when the action is registered.
pub fn feed_content() -> Perform {
    Perform::new(Verb::FeedContent)
}

/// Streams the provided content, escaping it.
pub fn feed_content_escaped(escapes: Arc<Escapes>) -> Perform {
    let mut perform = Perform::new(Verb::FeedContent);
    perform.escapes = Some(escapes);
    perform
}

/// Streams the provided indexed content, registering `actions` first on
/// each of its blocks.
pub fn feed_indexed<I, S>(actions: I) -> Perform
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut perform = Perform::new(Verb::FeedIndexed);
    perform.actions = actions.into_iter().map(Into::into).collect();
    perform
}

/// Sets the flags.
pub fn set_flag<I, S>(flags: I) -> Perform
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Perform::new(Verb::SetFlag).when(flags)
}

/// Sets the flags if the stream is strictly before the index.
pub fn set_flag_if_before<I, S>(index: &str, flags: I) -> Perform
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    indexed(Verb::SetFlagIfBefore, index).when(flags)
}

/// Sets the flags if the stream is at or after the index.
pub fn set_flag_if_not_before<I, S>(index: &str, flags: I) -> Perform
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    indexed(Verb::SetFlagIfNotBefore, index).when(flags)
}

/// Removes the flags.
pub fn rem_flag<I, S>(flags: I) -> Perform
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Perform::new(Verb::RemFlag).when(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_fill_slots() {
        let perform = push("stack", "end").when(["a", "b"]);
        assert_eq!(perform.verb(), Verb::Push);
        assert_eq!(perform.index(), Some("end"));
        assert_eq!(perform.name.as_deref(), Some("stack"));
        assert_eq!(perform.flags().len(), 2);

        let flag = set_flag_if_before("end", ["seen"]);
        assert!(!flag.verb.is_gated());
        assert!(flag.has_flags(&Default::default()));
        assert!(!feed("end").when(["x"]).has_flags(&Default::default()));
    }
}
