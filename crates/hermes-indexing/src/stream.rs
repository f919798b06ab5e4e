//! A byte stream that can record and rewind what it reads.

use crate::error::{IndexingError, IndexingResult};
use std::fmt;
use std::io::Read;

const DISCARD_CHUNK: usize = 1024;

/// Wraps a reader, tracking the position and supporting record/rewind.
///
/// Rewound bytes are served again before the wrapped reader is touched,
/// and [`ModifierStream::tell`] accounts for them.
pub struct ModifierStream {
    inner: Option<Box<dyn Read + Send>>,
    position: u64,
    record: Option<Vec<u8>>,
    rewind: Vec<u8>,
    rewind_at: usize,
}

impl ModifierStream {
    /// Wraps the reader.
    pub fn new(inner: impl Read + Send + 'static) -> Self {
        Self {
            inner: Some(Box::new(inner)),
            position: 0,
            record: None,
            rewind: Vec::new(),
            rewind_at: 0,
        }
    }

    fn pending_rewind(&self) -> &[u8] {
        &self.rewind[self.rewind_at..]
    }

    fn read_inner(&mut self, buffer: &mut [u8]) -> IndexingResult<usize> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(0);
        };
        let mut filled = 0;
        while filled < buffer.len() {
            match inner.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }

    /// Reads up to `count` bytes, fewer only at the end of the stream.
    pub fn read(&mut self, count: usize) -> IndexingResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(count);
        let rewound = self.pending_rewind().len().min(count);
        if rewound > 0 {
            bytes.extend_from_slice(&self.rewind[self.rewind_at..self.rewind_at + rewound]);
            self.rewind_at += rewound;
            if self.pending_rewind().is_empty() {
                self.rewind.clear();
                self.rewind_at = 0;
            }
        }
        if bytes.len() < count {
            let start = bytes.len();
            bytes.resize(count, 0);
            let read = self.read_inner(&mut bytes[start..])?;
            bytes.truncate(start + read);
        }
        if let Some(record) = self.record.as_mut() {
            record.extend_from_slice(&bytes);
        }
        Ok(bytes)
    }

    /// Reads everything left.
    pub fn read_to_end(&mut self) -> IndexingResult<Vec<u8>> {
        let mut bytes = self.pending_rewind().to_vec();
        self.rewind.clear();
        self.rewind_at = 0;
        if let Some(inner) = self.inner.as_mut() {
            let read = inner.read_to_end(&mut bytes)?;
            self.position += read as u64;
        }
        if let Some(record) = self.record.as_mut() {
            record.extend_from_slice(&bytes);
        }
        Ok(bytes)
    }

    /// The offset of the next byte to be read.
    pub fn tell(&self) -> u64 {
        self.position - self.pending_rewind().len() as u64
    }

    /// Discards bytes until [`ModifierStream::tell`] reaches `until`.
    ///
    /// Nothing happens if the stream is already there.
    pub fn discard(&mut self, until: u64) -> IndexingResult<()> {
        let mut missing = until.saturating_sub(self.tell());
        while missing > 0 {
            let chunk = usize::try_from(missing).map_or(DISCARD_CHUNK, |m| m.min(DISCARD_CHUNK));
            let block = self.read(chunk)?;
            if block.is_empty() {
                return Err(IndexingError::MissingBytes { missing });
            }
            missing -= block.len() as u64;
        }
        Ok(())
    }

    /// Starts recording the bytes read.
    pub fn record(&mut self) {
        if self.record.is_none() {
            self.record = Some(Vec::new());
        }
    }

    /// Stops recording and serves the recorded bytes again.
    pub fn rewind(&mut self) {
        if let Some(mut recorded) = self.record.take() {
            recorded.extend_from_slice(self.pending_rewind());
            self.rewind = recorded;
            self.rewind_at = 0;
        }
    }

    /// Stops recording, dropping what was recorded.
    pub fn stop(&mut self) {
        self.record = None;
    }

    /// Releases the wrapped reader; later reads yield nothing.
    pub fn close(&mut self) {
        self.record = None;
        self.rewind.clear();
        self.rewind_at = 0;
        self.inner = None;
    }

    /// Whether the wrapped reader was released.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl fmt::Debug for ModifierStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierStream")
            .field("tell", &self.tell())
            .field("recording", &self.record.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}
