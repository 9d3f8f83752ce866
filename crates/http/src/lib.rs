//! An asynchronous HTTP/1.1 and WebSocket connection engine
//!
//! This crate turns a pair of byte streams into a served connection: it frames
//! pipelined HTTP/1.1 requests out of arbitrarily chunked input, answers them in
//! order through a [`handler::Handler`], and upgrades connections that ask for it
//! to RFC 6455 WebSocket framing served by a [`ws::WsHandler`].
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn, Level};
//! use tracing_subscriber::FmtSubscriber;
//! use tidal_http::connection::HttpConnection;
//! use tidal_http::handler::make_handler;
//! use tidal_http::protocol::{HttpRequest, HttpResponse};
//! use tidal_http::ws::{Outbox, WsHandler};
//!
//! struct Shout;
//!
//! impl WsHandler for Shout {
//!     fn on_message(&mut self, text: &str, outbox: &mut Outbox) {
//!         outbox.send_text(text.to_uppercase());
//!     }
//! }
//!
//! async fn hello_world(request: HttpRequest) -> Result<HttpResponse, Infallible> {
//!     info!(path = request.path(), "receiving request");
//!     Ok(HttpResponse::ok().header("Content-Type", "text/plain").body("Hello World!\r\n"))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:4221").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!     let ws_factory = Arc::new(|_request: &HttpRequest| Shout);
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = Arc::clone(&handler);
//!         let ws_factory = Arc::clone(&ws_factory);
//!
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer);
//!             if let Err(e) = connection.process(handler, ws_factory).await {
//!                 error!("service has error, cause {}, connection shutdown", e);
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: requests, replies, header fields and error types
//! - [`codec`]: the receive buffer, request framing and reply serialization
//! - [`ws`]: the opening handshake, frame codec and WebSocket handler traits
//! - [`handler`]: the HTTP handler trait and [`handler::make_handler`]
//! - [`connection`]: the per-connection state machine tying the above together
//!
//! # Limitations
//!
//! - HTTP/1.1 only, without chunked transfer encoding
//! - Request and reply bodies are held in memory whole
//! - Fragmented WebSocket messages are not reassembled
//! - No TLS support (use a reverse proxy for HTTPS)

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod ws;

mod utils;
pub(crate) use utils::ensure;
