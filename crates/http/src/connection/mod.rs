//! Per-connection session handling
//!
//! # Components
//!
//! - [`HttpConnection`]: drives one accepted connection. It starts in the
//!   [`ConnectionState::Http`] state, answers pipelined requests in order, switches
//!   to [`ConnectionState::WebSocket`] after a successful upgrade, and ends in
//!   [`ConnectionState::Closed`].
//! - [`ConnectionConfig`]: buffer sizes and framing limits
//!
//! Replies and frames produced while the receive buffer is drained are queued
//! and written with a single flush before the next read.

mod http_connection;
mod message_writer;

pub use http_connection::ConnectionConfig;
pub use http_connection::ConnectionState;
pub use http_connection::HttpConnection;
