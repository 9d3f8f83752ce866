//! WebSocket frame model and wire layout (RFC 6455 section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::ensure;
use crate::protocol::WsError;

const FIN_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;
const OPCODE_BITS: u8 = 0x0F;
const MASK_BIT: u8 = 0x80;
const LEN_BITS: u8 = 0x7F;

/// Largest payload length encoded directly in the base header.
const MAX_INLINE_LEN: u64 = 125;
const LEN_16_MARKER: u8 = 126;
const LEN_64_MARKER: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Result<Self, WsError> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(WsError::InvalidOpcode(other)),
        }
    }

    pub fn is_control(self) -> bool {
        (self as u8) >= 0x8
    }
}

/// Status code and reason carried by a CLOSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const PROTOCOL_ERROR: u16 = 1002;
    pub const TOO_BIG: u16 = 1009;
    pub const INTERNAL: u16 = 1011;

    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }
}

/// The fixed-size part of a frame, as far as it could be read from a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub opcode: OpCode,
    pub masked: bool,
    /// Payload length as declared on the wire.
    pub payload_len: u64,
    /// Masking key in wire order, `Some` iff `masked`.
    pub mask_key: Option<[u8; 4]>,
    /// Bytes taken by the header, extended length and masking key included.
    pub header_len: usize,
}

impl FrameHeader {
    /// Reads a frame header from the start of `buf`.
    ///
    /// Returns `Ok(None)` while the base header, the extended length or the
    /// masking key is not fully buffered. Nothing is consumed.
    pub fn peek(buf: &[u8]) -> Result<Option<Self>, WsError> {
        let [b0, b1, rest @ ..] = buf else {
            return Ok(None);
        };

        ensure!(b0 & RSV_BITS == 0, WsError::malformed_frame("reserved bits set without a negotiated extension"));

        let fin = b0 & FIN_BIT != 0;
        let opcode = OpCode::from_u8(b0 & OPCODE_BITS)?;
        let masked = b1 & MASK_BIT != 0;

        let (payload_len, rest, mut header_len) = match b1 & LEN_BITS {
            LEN_16_MARKER => match rest {
                [h, l, rest @ ..] => (u64::from(u16::from_be_bytes([*h, *l])), rest, 4),
                _ => return Ok(None),
            },
            LEN_64_MARKER => match rest.split_first_chunk::<8>() {
                Some((len, rest)) => (u64::from_be_bytes(*len), rest, 10),
                None => return Ok(None),
            },
            len => (u64::from(len), rest, 2),
        };

        let mask_key = if masked {
            match rest.first_chunk::<4>() {
                Some(key) => {
                    header_len += 4;
                    Some(*key)
                }
                None => return Ok(None),
            }
        } else {
            None
        };

        Ok(Some(Self { fin, opcode, masked, payload_len, mask_key, header_len }))
    }

    /// Total bytes of the frame on the wire, `None` if it cannot be addressed in memory.
    pub fn frame_len(&self) -> Option<usize> {
        usize::try_from(self.payload_len).ok()?.checked_add(self.header_len)
    }
}

/// A complete WebSocket frame with its payload already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsFrame {
    fin: bool,
    opcode: OpCode,
    mask_key: Option<[u8; 4]>,
    payload: Bytes,
}

impl WsFrame {
    pub fn new(opcode: OpCode, payload: impl Into<Bytes>, fin: bool) -> Self {
        Self { fin, opcode, mask_key: None, payload: payload.into() }
    }

    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Text, data, true)
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Binary, data, true)
    }

    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Ping, data, true)
    }

    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Pong, data, true)
    }

    /// A CLOSE frame carrying a status code and a UTF-8 reason.
    pub fn close(code: u16, reason: &str) -> Self {
        let mut payload = BytesMut::with_capacity(2 + reason.len());
        payload.put_u16(code);
        payload.put_slice(reason.as_bytes());
        Self::new(OpCode::Close, payload.freeze(), true)
    }

    /// Marks the frame to be masked with `key` when encoded, as clients must do.
    #[must_use]
    pub fn masked(mut self, key: [u8; 4]) -> Self {
        self.mask_key = Some(key);
        self
    }

    /// Decodes a frame whose bytes, and only whose bytes, are in `raw`.
    pub fn parse(raw: Bytes) -> Result<Self, WsError> {
        let header = FrameHeader::peek(&raw)?.ok_or_else(|| WsError::malformed_frame("truncated frame header"))?;
        let frame_len = header.frame_len().ok_or_else(|| WsError::frame_too_large(header.payload_len, usize::MAX as u64))?;
        ensure!(raw.len() >= frame_len, WsError::malformed_frame(format!("expected {frame_len} bytes, got {}", raw.len())));

        let payload = raw.slice(header.header_len..frame_len);
        let payload = match header.mask_key {
            Some(key) => {
                let mut payload = BytesMut::from(&payload[..]);
                apply_mask(&mut payload, key);
                payload.freeze()
            }
            None => payload,
        };

        Ok(Self { fin: header.fin, opcode: header.opcode, mask_key: header.mask_key, payload })
    }

    /// Appends the wire form of this frame to `dst`.
    pub fn encode_to(&self, dst: &mut BytesMut) {
        let len = self.payload.len() as u64;
        let mask_bit = if self.mask_key.is_some() { MASK_BIT } else { 0 };

        dst.reserve(14 + self.payload.len());
        let fin_bit = if self.fin { FIN_BIT } else { 0 };
        dst.put_u8(fin_bit | self.opcode as u8);

        if len <= MAX_INLINE_LEN {
            #[allow(clippy::cast_possible_truncation, reason = "len <= 125")]
            dst.put_u8(mask_bit | len as u8);
        } else if let Ok(len) = u16::try_from(len) {
            dst.put_u8(mask_bit | LEN_16_MARKER);
            dst.put_u16(len);
        } else {
            dst.put_u8(mask_bit | LEN_64_MARKER);
            dst.put_u64(len);
        }

        match self.mask_key {
            Some(key) => {
                dst.put_slice(&key);
                let start = dst.len();
                dst.put_slice(&self.payload);
                apply_mask(&mut dst[start..], key);
            }
            None => dst.put_slice(&self.payload),
        }
    }

    /// Encodes this frame into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode_to(&mut dst);
        dst.freeze()
    }

    pub fn fin(&self) -> bool {
        self.fin
    }

    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    pub fn is_masked(&self) -> bool {
        self.mask_key.is_some()
    }

    pub fn mask_key(&self) -> Option<[u8; 4]> {
        self.mask_key
    }

    /// The masking key as a big-endian integer, byte 0 being bits 31 to 24.
    pub fn mask_key_u32(&self) -> Option<u32> {
        self.mask_key.map(u32::from_be_bytes)
    }

    pub fn payload_len(&self) -> u64 {
        self.payload.len() as u64
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Status code and reason of a CLOSE frame; `None` when the payload has no code.
    pub fn close_reason(&self) -> Option<CloseReason> {
        let (code, reason) = self.payload.split_first_chunk::<2>()?;
        Some(CloseReason::new(u16::from_be_bytes(*code), String::from_utf8_lossy(reason)))
    }
}

/// XORs every byte `i` of `payload` with byte `i mod 4` of `key`.
///
/// Masking and unmasking are the same operation.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}
