//! HTTP reply serialization
//!
//! Writes the status line, the header fields, the blank line that always ends
//! the header block, and the body. Replies without an explicit
//! `Content-Length` get one computed from the body, except for 1xx replies
//! which must not carry it, so that a pipelining client can find where each
//! reply ends.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::StatusCode;
use tokio_util::codec::Encoder;

use crate::protocol::{HttpResponse, SendError};

/// Initial buffer size reserved for the status line and header fields
const INIT_HEADER_SIZE: usize = 256;

const CONTENT_LENGTH: &str = "Content-Length";

#[derive(Debug, Default)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<HttpResponse> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: HttpResponse, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (status, headers, body) = item.into_parts();

        // a rejected reply leaves nothing behind in dst
        if let Some((name, _)) = headers.iter().find(|(name, value)| name.contains(['\r', '\n']) || value.contains(['\r', '\n'])) {
            return Err(SendError::invalid_response(format!("header {name} contains a line break")));
        }

        dst.reserve(INIT_HEADER_SIZE + body.len());
        write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), reason_phrase(status))?;

        for (name, value) in &headers {
            put_field(dst, name, value);
        }

        if !status.is_informational() && !headers.contains_ignore_case(CONTENT_LENGTH) {
            put_field(dst, CONTENT_LENGTH, &body.len().to_string());
        }

        dst.put_slice(b"\r\n");
        dst.put_slice(&body);
        Ok(())
    }
}

/// Reason phrase of the status line, `"Unknown"` for unregistered codes.
pub fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}

fn put_field(dst: &mut BytesMut, name: &str, value: &str) {
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value.as_bytes());
    dst.put_slice(b"\r\n");
}

/// Writer over `BytesMut` so `write!` can format straight into the buffer.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(response: HttpResponse) -> String {
        let mut dst = BytesMut::new();
        ResponseEncoder.encode(response, &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn empty_reply_still_has_blank_line() {
        assert_eq!(encode(HttpResponse::ok()), "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(encode(HttpResponse::not_found()), "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(encode(HttpResponse::internal_error()), "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
    }

    #[test]
    fn explicit_content_length_kept() {
        let response = HttpResponse::ok().header("Content-Type", "text/plain").header("Content-Length", "3").body("abc");

        assert_eq!(encode(response), "HTTP/1.1 200 OK\r\nContent-Length: 3\r\nContent-Type: text/plain\r\n\r\nabc");
    }

    #[test]
    fn switching_protocols_has_no_length() {
        let response = HttpResponse::with_status(StatusCode::SWITCHING_PROTOCOLS).header("Upgrade", "websocket");

        assert_eq!(encode(response), "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n");
    }

    #[test]
    fn unregistered_status_code() {
        let status = StatusCode::from_u16(599).unwrap();
        assert!(encode(HttpResponse::with_status(status)).starts_with("HTTP/1.1 599 Unknown\r\n"));
    }

    #[test]
    fn rejects_header_injection() {
        let mut dst = BytesMut::new();
        dst.put_slice(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        let result = ResponseEncoder.encode(HttpResponse::ok().header("X-Evil", "a\r\nSet-Cookie: b"), &mut dst);
        assert!(matches!(result, Err(SendError::InvalidResponse { .. })));
        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
    }
}
