//! Core protocol types shared by the HTTP and WebSocket sides of a connection.
//!
//! # Components
//!
//! - **Messages**
//!   - [`HttpRequest`]: a complete request, body included
//!   - [`HttpResponse`]: a complete reply
//!   - [`Headers`]: case-preserving, case-sensitive header fields
//!
//! - **Errors**
//!   - [`HttpError`]: top-level error of a connection
//!   - [`ParseError`]: request framing and parsing errors
//!   - [`SendError`]: reply serialization and write errors
//!   - [`WsError`]: websocket framing errors

mod headers;
pub use headers::Headers;

mod request;
pub use request::HttpRequest;

mod response;
pub use response::HttpResponse;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::WsError;
