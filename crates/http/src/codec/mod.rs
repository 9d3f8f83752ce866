//! HTTP codec module for framing requests and serializing replies
//!
//! # Architecture
//!
//! - [`ByteAccumulator`]: the per-connection receive buffer. It holds bytes until
//!   a framer reports that a complete unit sits at its head.
//! - Request handling:
//!   - [`HttpFramer`]: finds request boundaries (`CRLF CRLF` plus
//!     `Content-Length`) and parses complete requests
//!   - [`RequestDecoder`]: the same framer behind tokio-util's [`Decoder`](tokio_util::codec::Decoder)
//! - Response handling:
//!   - [`ResponseEncoder`]: serializes [`HttpResponse`](crate::protocol::HttpResponse)
//!
//! WebSocket frames have their own codec in [`crate::ws`].
//!
//! # Example
//!
//! ```
//! use tidal_http::codec::{ByteAccumulator, HttpFramer};
//!
//! let framer = HttpFramer::new();
//! let mut acc = ByteAccumulator::new();
//!
//! acc.append(b"GET / HTTP/1.1\r\n");
//! assert!(acc.peek_complete(|buf| framer.request_len(buf)).unwrap().is_none());
//!
//! acc.append(b"\r\n");
//! let raw = acc.peek_complete(|buf| framer.request_len(buf)).unwrap().unwrap();
//! assert_eq!(framer.parse(raw).unwrap().path(), "/");
//! ```

mod accumulator;
mod request_decoder;
mod response_encoder;

pub use accumulator::ByteAccumulator;
pub use accumulator::DEFAULT_READ_CAPACITY;
pub use request_decoder::DEFAULT_MAX_BODY_BYTES;
pub use request_decoder::DEFAULT_MAX_HEADER_BYTES;
pub use request_decoder::HttpFramer;
pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
pub use response_encoder::reason_phrase;
