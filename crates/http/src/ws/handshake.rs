//! WebSocket opening handshake (RFC 6455 section 4.2).
//!
//! An upgrade request is an ordinary HTTP request carrying all of:
//!
//! - `Connection` containing `Upgrade`
//! - `Upgrade: websocket`
//! - `Sec-WebSocket-Version: 13`
//! - `Sec-WebSocket-Key`
//!
//! Header names are matched exactly as the peer spelled them. Anything short of
//! all four is routed as plain HTTP.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::StatusCode;
use sha1::{Digest, Sha1};

use crate::protocol::{HttpRequest, HttpResponse};

/// Fixed GUID appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub const SUPPORTED_VERSION: &str = "13";

/// Whether `request` asks to switch the connection to the WebSocket protocol.
pub fn is_upgrade_request(request: &HttpRequest) -> bool {
    let connection_upgrade = request.header("Connection").is_some_and(|value| value.contains("Upgrade"));
    let upgrade_websocket = request.header("Upgrade") == Some("websocket");
    let version_matches = request.header("Sec-WebSocket-Version") == Some(SUPPORTED_VERSION);
    let has_key = request.headers().contains("Sec-WebSocket-Key");

    connection_upgrade && upgrade_websocket && version_matches && has_key
}

/// Computes `Sec-WebSocket-Accept`: base64 of the SHA-1 digest of key + GUID.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// The `101 Switching Protocols` reply completing the handshake of `request`.
pub fn handshake_response(request: &HttpRequest) -> HttpResponse {
    let key = request.header("Sec-WebSocket-Key").unwrap_or_default();

    HttpResponse::with_status(StatusCode::SWITCHING_PROTOCOLS)
        .header("Upgrade", "websocket")
        .header("Connection", "Upgrade")
        .header("Sec-WebSocket-Accept", accept_key(key))
}
