//! Indexed content and the values provided to modifications.

use crate::model::Index;
use crate::stream::ModifierStream;
use parking_lot::Mutex;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

/// Default bound of a streamed package.
pub const DEFAULT_MAXIMUM: usize = 1024;

/// Converts between the content bytes and text.
pub trait Codec: Send + Sync {
    /// Converts source bytes to the expected encoding.
    fn encode(&self, bytes: &[u8]) -> Vec<u8>;

    /// Converts text to the expected encoding.
    fn encode_text(&self, text: &str) -> Vec<u8> {
        self.encode(text.as_bytes())
    }

    /// Converts bytes in the expected encoding to text.
    fn decode(&self, bytes: &[u8]) -> String;
}

/// UTF-8 in, UTF-8 out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl Codec for Utf8 {
    fn encode(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// A body stream with its indexes.
pub struct Content {
    pub(crate) source: ModifierStream,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) indexes: Vec<Index>,
    pub(crate) maximum: usize,
}

impl Content {
    /// Creates UTF-8 content with no indexes.
    pub fn new(source: impl Read + Send + 'static) -> Self {
        Self {
            source: ModifierStream::new(source),
            codec: Arc::new(Utf8),
            indexes: Vec::new(),
            maximum: DEFAULT_MAXIMUM,
        }
    }

    /// Sets the indexes, in body order.
    #[must_use]
    pub fn with_indexes(mut self, indexes: Vec<Index>) -> Self {
        self.indexes = indexes;
        self
    }

    /// Sets the codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the maximum package size, at least one byte.
    #[must_use]
    pub fn with_maximum(mut self, maximum: usize) -> Self {
        self.maximum = maximum.max(1);
        self
    }

    /// The indexes.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// The maximum package size.
    pub fn maximum(&self) -> usize {
        self.maximum
    }

    /// The codec.
    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("source", &self.source)
            .field("indexes", &self.indexes.len())
            .field("maximum", &self.maximum)
            .finish()
    }
}

/// A value provided to an action when it is registered.
///
/// Provided content is streamed at most once, by the first perform that
/// uses it.
#[derive(Clone)]
pub enum Provided {
    /// Literal text.
    Text(Arc<str>),
    /// A content stream, possibly indexed.
    Content(Arc<Mutex<Option<Content>>>),
}

impl Provided {
    /// Provides text.
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    /// Provides content.
    pub fn content(content: Content) -> Self {
        Self::Content(Arc::new(Mutex::new(Some(content))))
    }

    pub(crate) fn has_indexes(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Content(content) => content.lock().as_ref().is_some_and(|c| !c.indexes.is_empty()),
        }
    }

    pub(crate) fn take_content(&self) -> Option<Content> {
        match self {
            Self::Text(_) => None,
            Self::Content(content) => content.lock().take(),
        }
    }
}

impl fmt::Debug for Provided {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Content(_) => f.write_str("Content(..)"),
        }
    }
}
