//! Per-connection receive buffer.
//!
//! Socket reads land at the tail of a [`ByteAccumulator`]; framers look at the
//! head and decide whether a complete unit is there. The accumulator never
//! guesses a unit boundary on its own: HTTP and WebSocket declare lengths in
//! different ways, so the size of the next unit always comes from an extractor
//! supplied by the framer of the current mode.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Default read capacity, one socket read fills at most this many fresh bytes.
pub const DEFAULT_READ_CAPACITY: usize = 4 * 1024;

#[derive(Debug)]
pub struct ByteAccumulator {
    buf: BytesMut,
    read_capacity: usize,
}

impl ByteAccumulator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_READ_CAPACITY)
    }

    pub fn with_capacity(read_capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(read_capacity), read_capacity }
    }

    /// Adds freshly received bytes to the tail.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Asks `extractor` whether a complete unit sits at the head of the buffer.
    ///
    /// The extractor returns `Ok(Some(n))` when the unit spans the first `n`
    /// bytes, `Ok(None)` when more bytes are needed, or an error when the head
    /// can never become a valid unit. On `Some(n)` exactly `n` bytes are removed
    /// and returned; in every other case the buffer is left untouched. A length
    /// beyond what is buffered counts as incomplete.
    pub fn peek_complete<F, E>(&mut self, extractor: F) -> Result<Option<Bytes>, E>
    where
        F: FnOnce(&[u8]) -> Result<Option<usize>, E>,
    {
        match extractor(&self.buf)? {
            Some(unit_len) if unit_len <= self.buf.len() => {
                trace!(unit_len, remaining = self.buf.len() - unit_len, "extracted complete unit");
                Ok(Some(self.buf.split_to(unit_len).freeze()))
            }
            _ => Ok(None),
        }
    }

    /// Performs a single read from `reader` into the tail of the buffer.
    ///
    /// Returns the number of bytes read; `0` means the peer closed its side.
    pub async fn read_from<R>(&mut self, reader: &mut R) -> io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.buf.reserve(self.read_capacity);
        reader.read_buf(&mut self.buf).await
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The bytes not yet consumed by any extraction.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for ByteAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
