//! Streaming WebSocket frame codec.
//!
//! [`FrameCodec::frame_len`] decides, from the header alone, how many bytes the
//! frame at the head of a buffer spans:
//!
//! 1. base header (2 bytes): FIN, opcode, MASK and the 7 bit length `L`
//! 2. `L == 126`: 2 more bytes of big-endian length; `L == 127`: 8 more bytes
//! 3. masked frames: 4 more bytes of masking key
//! 4. the payload itself
//!
//! If any of these is short the frame is still pending and nothing is consumed.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::ensure;
use crate::protocol::WsError;
use crate::ws::frame::{FrameHeader, WsFrame};

/// Default upper bound of a single frame payload
pub const DEFAULT_MAX_PAYLOAD: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_payload: u64,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload: u64) -> Self {
        Self { max_payload }
    }

    /// Returns the wire length of the frame at the head of `buf` once it is fully buffered.
    ///
    /// Oversized payloads are rejected as soon as the length field is readable,
    /// without waiting for the payload bytes.
    pub fn frame_len(&self, buf: &[u8]) -> Result<Option<usize>, WsError> {
        let Some(header) = FrameHeader::peek(buf)? else {
            return Ok(None);
        };

        ensure!(header.payload_len <= self.max_payload, WsError::frame_too_large(header.payload_len, self.max_payload));
        let frame_len = header.frame_len().ok_or_else(|| WsError::frame_too_large(header.payload_len, self.max_payload))?;

        trace!(opcode = ?header.opcode, frame_len, buffered = buf.len(), "located frame boundary");
        Ok((buf.len() >= frame_len).then_some(frame_len))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = WsFrame;
    type Error = WsError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frame_len(src)? {
            Some(len) => WsFrame::parse(src.split_to(len).freeze()).map(Some),
            None => Ok(None),
        }
    }
}

impl Encoder<WsFrame> for FrameCodec {
    type Error = WsError;

    fn encode(&mut self, item: WsFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_to(dst);
        Ok(())
    }
}
