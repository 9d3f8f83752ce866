//! WebSocket support (RFC 6455) for connections upgraded from HTTP/1.1
//!
//! # Components
//!
//! - [`handshake`]: recognises upgrade requests and computes `Sec-WebSocket-Accept`
//! - [`WsFrame`] and [`FrameHeader`]: the frame model and its wire layout
//! - [`FrameCodec`]: finds frame boundaries in a byte stream, decodes and encodes frames
//! - [`WsHandler`], [`WsHandlerFactory`] and [`Outbox`]: the application side of
//!   an upgraded connection
//!
//! Fragmented messages are not reassembled: CONTINUATION frames decode like any
//! other frame and are left to the session to ignore. Extensions and
//! subprotocols are never negotiated.

mod codec;
mod frame;
mod handler;
pub mod handshake;

pub use codec::DEFAULT_MAX_PAYLOAD;
pub use codec::FrameCodec;
pub use frame::CloseReason;
pub use frame::FrameHeader;
pub use frame::OpCode;
pub use frame::WsFrame;
pub use frame::apply_mask;
pub use handler::Outbox;
pub use handler::WsHandler;
pub use handler::WsHandlerFactory;
pub use handshake::WS_GUID;
