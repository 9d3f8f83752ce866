//! The tidal server: a route table, the stock handlers and the TCP acceptor
//! around [`tidal_http`] connections.
//!
//! ```no_run
//! use tidal_server::{Server, default_router};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::builder().port(4221).router(default_router()).build().unwrap();
//!     server.start().await.unwrap();
//! }
//! ```

mod config;
mod handlers;
mod router;
mod server;

pub use config::{DEFAULT_BACKLOG, DEFAULT_PORT, ServerConfig};
pub use handlers::{EchoSocket, EchoSockets, default_router, echo, root, user_agent};
pub use router::{ECHO_ROUTE, Router, RouterBuilder};
pub use server::{Server, ServerBuildError, ServerBuilder, ServerError};
