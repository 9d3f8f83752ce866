//! HTTP request framing
//!
//! This module finds the boundary of the next request in a byte stream and turns
//! the bytes of one complete request into an [`HttpRequest`].
//!
//! # Framing rules
//!
//! - The header block ends at the first empty line (`CRLF CRLF`); until it has
//!   been received the request is incomplete.
//! - The body is exactly `Content-Length` bytes (field name matched
//!   case-insensitively, value trimmed); without that field the body is empty.
//! - Bytes beyond `header block + body` belong to the next, pipelined request and
//!   are left where they are.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header block size: 8KB by default
//! - Maximum declared body size: 16MB by default
//!
//! # Example
//!
//! ```
//! use tidal_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from(&b"GET /echo/abc HTTP/1.1\r\n\r\nGET / HT"[..]);
//!
//! let request = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(request.path(), "/echo/abc");
//! assert_eq!(&buffer[..], b"GET / HT");
//! ```

use bytes::{Bytes, BytesMut};
use http::{Method, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{Headers, HttpRequest, ParseError};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Default maximum size in bytes allowed for the entire header section
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Default maximum `Content-Length` accepted for a request body
pub const DEFAULT_MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Locates and parses complete HTTP requests.
///
/// [`HttpFramer::request_len`] is the extractor handed to a
/// [`ByteAccumulator`](crate::codec::ByteAccumulator); [`HttpFramer::parse`]
/// turns the extracted bytes into a request.
#[derive(Debug, Clone, Copy)]
pub struct HttpFramer {
    max_header_bytes: usize,
    max_body_bytes: u64,
}

impl HttpFramer {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_BODY_BYTES)
    }

    pub fn with_limits(max_header_bytes: usize, max_body_bytes: u64) -> Self {
        Self { max_header_bytes, max_body_bytes }
    }

    /// Returns the byte length of the request at the head of `buf`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(len))`: the first `len` bytes form one complete request
    /// - `Ok(None)`: the header terminator or part of the body is still missing
    /// - `Err(_)`: the head of the buffer can never become a valid request
    pub fn request_len(&self, buf: &[u8]) -> Result<Option<usize>, ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        match req.parse(buf).map_err(from_httparse)? {
            Status::Complete(header_len) => {
                ensure!(header_len <= self.max_header_bytes, ParseError::too_large_header(header_len, self.max_header_bytes));

                let body_len = content_length(req.headers)?;
                ensure!(body_len <= self.max_body_bytes, ParseError::too_large_body(body_len, self.max_body_bytes));

                // bounded by max_body_bytes above
                let total = header_len + usize::try_from(body_len).map_err(|_e| ParseError::too_large_body(body_len, self.max_body_bytes))?;
                trace!(header_len, body_len, buffered = buf.len(), "located request boundary");

                Ok((buf.len() >= total).then_some(total))
            }
            Status::Partial => {
                ensure!(buf.len() <= self.max_header_bytes, ParseError::too_large_header(buf.len(), self.max_header_bytes));
                Ok(None)
            }
        }
    }

    /// Parses one complete request previously delimited by [`HttpFramer::request_len`].
    ///
    /// The request line is parsed strictly: a line that does not split into
    /// method, target and `HTTP/1.x` version is rejected.
    pub fn parse(&self, raw: Bytes) -> Result<HttpRequest, ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let header_len = match req.parse(&raw).map_err(from_httparse)? {
            Status::Complete(header_len) => header_len,
            Status::Partial => return Err(ParseError::invalid_request_line("request head is incomplete")),
        };

        let method = req.method.ok_or_else(|| ParseError::invalid_request_line("missing method"))?;
        let method = Method::from_bytes(method.as_bytes()).map_err(|_e| ParseError::invalid_request_line(format!("invalid method {method}")))?;
        let path = req.path.ok_or_else(|| ParseError::invalid_request_line("missing request target"))?;

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let body_len = usize::try_from(content_length(req.headers)?).map_err(|_e| ParseError::invalid_content_length("value overflows usize"))?;
        let body_end = header_len + body_len;
        ensure!(raw.len() >= body_end, ParseError::invalid_content_length(format!("declared {body_len} bytes, got {}", raw.len() - header_len)));

        let fields = req.headers.iter().map(|header| (header.name, String::from_utf8_lossy(header.value).into_owned())).collect::<Headers>();

        Ok(HttpRequest::new(method, path, version, fields, raw.slice(header_len..body_end)))
    }
}

impl Default for HttpFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Decoder`] producing one [`HttpRequest`] per complete request in the buffer.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    framer: HttpFramer,
}

impl RequestDecoder {
    /// Creates a new `RequestDecoder` instance with default limits
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_framer(framer: HttpFramer) -> Self {
        Self { framer }
    }
}

impl Decoder for RequestDecoder {
    type Item = HttpRequest;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.framer.request_len(src)? {
            Some(len) => self.framer.parse(src.split_to(len).freeze()).map(Some),
            None => Ok(None),
        }
    }
}

fn from_httparse(e: httparse::Error) -> ParseError {
    match e {
        httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        httparse::Error::Version => ParseError::InvalidVersion(None),
        httparse::Error::Token | httparse::Error::NewLine => ParseError::invalid_request_line(e),
        e => ParseError::invalid_header(e),
    }
}

/// Reads the declared body length from the header fields.
///
/// # Errors
///
/// Returns `ParseError` if:
/// - Content-Length is not a non-negative integer
/// - Content-Length is repeated with different values
/// - Transfer-Encoding is present, chunked bodies are not supported
fn content_length(headers: &[httparse::Header<'_>]) -> Result<u64, ParseError> {
    let mut length: Option<u64> = None;

    for header in headers {
        if header.name.eq_ignore_ascii_case("transfer-encoding") {
            return Err(ParseError::invalid_header("transfer-encoding is not supported"));
        }

        if !header.name.eq_ignore_ascii_case("content-length") {
            continue;
        }

        let value = std::str::from_utf8(header.value).map_err(|_e| ParseError::invalid_content_length("value is not utf-8"))?.trim();
        let parsed = value.parse::<u64>().map_err(|_e| ParseError::invalid_content_length(format!("value {value} is not u64")))?;

        match length {
            Some(previous) if previous != parsed => {
                return Err(ParseError::invalid_content_length(format!("conflicting values {previous} and {parsed}")));
            }
            _ => length = Some(parsed),
        }
    }

    Ok(length.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ByteAccumulator;
    use indoc::indoc;

    #[test]
    fn bare_request_line() {
        let mut buf = BytesMut::from(&b"GET /echo/abc HTTP/1.1\r\n\r\n"[..]);

        let request = RequestDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.path(), "/echo/abc");
        assert_eq!(request.version_str(), "HTTP/1.1");
        assert!(request.headers().is_empty());
        assert!(request.body().is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /user-agent HTTP/1.1
        Host: 127.0.0.1:4221
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);
        let request = RequestDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(request.path(), "/user-agent");
        assert_eq!(request.headers().len(), 3);
        assert_eq!(request.header("Host"), Some("127.0.0.1:4221"));
        assert_eq!(request.header("User-Agent"), Some("curl/7.79.1"));
        assert_eq!(request.header("user-agent"), None);
        assert_eq!(request.header("Accept"), Some("*/*"));
    }

    #[test]
    fn body_follows_content_length() {
        let mut buf = BytesMut::from(&b"POST /files HTTP/1.1\r\ncontent-length:  5 \r\n\r\nhelloGET / HTTP/1.1\r\n\r\n"[..]);

        let request = RequestDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(&request.body()[..], b"hello");
        assert_eq!(&buf[..], b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn incomplete_header_and_body() {
        let framer = HttpFramer::new();

        assert_eq!(framer.request_len(b"").unwrap(), None);
        assert_eq!(framer.request_len(b"GET / HTTP/1.1\r\nHost: a\r\n").unwrap(), None);
        assert_eq!(framer.request_len(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nab").unwrap(), None);

        let complete = b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcd";
        assert_eq!(framer.request_len(complete).unwrap(), Some(complete.len()));
    }

    #[test]
    fn incomplete_request_keeps_buffer() {
        let mut buf = BytesMut::from(&b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n12345"[..]);
        let before = buf.clone();

        assert!(RequestDecoder::new().decode(&mut buf).unwrap().is_none());
        assert_eq!(buf, before);
    }

    #[test]
    fn malformed_content_length() {
        let framer = HttpFramer::new();

        let err = framer.request_len(b"POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidContentLength { .. }));

        let err = framer.request_len(b"POST / HTTP/1.1\r\nContent-Length: -3\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidContentLength { .. }));

        let err = framer.request_len(b"POST / HTTP/1.1\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\nab").unwrap_err();
        assert!(matches!(err, ParseError::InvalidContentLength { .. }));
    }

    #[test]
    fn chunked_body_rejected() {
        let err = HttpFramer::new().request_len(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidHeader { .. }));
    }

    #[test]
    fn invalid_request_line() {
        let err = HttpFramer::new().request_len(b"NOT A REQUEST\r\n\r\n").unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn header_limit() {
        let framer = HttpFramer::with_limits(32, DEFAULT_MAX_BODY_BYTES);

        let err = framer.request_len(b"GET / HTTP/1.1\r\nX-Long-Header: 0123456789abcdef").unwrap_err();
        assert!(matches!(err, ParseError::TooLargeHeader { .. }));
        assert_eq!(err.status_code(), http::StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE);
    }

    #[test]
    fn body_limit() {
        let framer = HttpFramer::with_limits(DEFAULT_MAX_HEADER_BYTES, 4);

        let err = framer.request_len(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::TooLargeBody { declared_size: 5, max_size: 4 }));
        assert_eq!(err.status_code(), http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn duplicate_headers_last_wins() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nX-Tag: first\r\nX-Tag: second\r\n\r\n"[..]);
        let request = RequestDecoder::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(request.header("X-Tag"), Some("second"));
    }

    #[test]
    fn framing_is_chunk_boundary_invariant() {
        let stream: &[u8] = b"GET /echo/abc HTTP/1.1\r\n\r\n\
            POST /submit HTTP/1.1\r\nContent-Length: 7\r\nUser-Agent: test-agent\r\n\r\npayload\
            GET /user-agent HTTP/1.1\r\nUser-Agent: test-agent\r\n\r\n";

        let framer = HttpFramer::new();
        let expected = {
            let mut acc = ByteAccumulator::new();
            acc.append(stream);
            let mut units = Vec::new();
            while let Some(raw) = acc.peek_complete(|buf| framer.request_len(buf)).unwrap() {
                units.push(raw);
            }
            units
        };
        assert_eq!(expected.len(), 3);

        for chunk_size in 1..=stream.len() {
            let mut acc = ByteAccumulator::new();
            let mut units = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                acc.append(chunk);
                while let Some(raw) = acc.peek_complete(|buf| framer.request_len(buf)).unwrap() {
                    units.push(raw);
                }
            }
            assert_eq!(units, expected, "chunk size {chunk_size}");
            assert!(acc.is_empty());
        }

        let requests = expected.into_iter().map(|raw| framer.parse(raw).unwrap()).collect::<Vec<_>>();
        assert_eq!(&requests[1].body()[..], b"payload");
        assert_eq!(requests[2].header("User-Agent"), Some("test-agent"));
    }
}
