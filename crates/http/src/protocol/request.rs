//! HTTP request representation.
//!
//! A [`HttpRequest`] is produced by the request framer once a complete message
//! (request line, header block and `Content-Length` bytes of body) has been
//! buffered. It owns its body, so handlers never touch the connection buffer.

use bytes::Bytes;
use http::{Method, Version};

use crate::protocol::Headers;

/// A fully buffered HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    version: Version,
    headers: Headers,
    body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>, version: Version, headers: Headers, body: Bytes) -> Self {
        Self { method, path: path.into(), version, headers, body }
    }

    /// Shorthand for a body-less `HTTP/1.1` request, mostly useful to handlers' tests.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, Version::HTTP_11, Headers::new(), Bytes::new())
    }

    /// Returns a copy of this request with one more header field.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target exactly as it appeared in the request line.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Renders the protocol version the way it appears in the request line.
    pub fn version_str(&self) -> &'static str {
        match self.version {
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_2 => "HTTP/2.0",
            Version::HTTP_3 => "HTTP/3.0",
            _ => "HTTP/0.9",
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Case-sensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}
