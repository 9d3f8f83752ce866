//! Application callbacks of an upgraded connection.
//!
//! A [`WsHandler`] is created per connection by a [`WsHandlerFactory`] when the
//! handshake completes, and is owned by that connection's task until it closes.
//! Handlers reply through an [`Outbox`]; the session writes queued frames after
//! every callback returns, in the order they were queued.

use bytes::Bytes;

use crate::protocol::HttpRequest;
use crate::ws::frame::{CloseReason, WsFrame};

pub trait WsHandler: Send {
    /// A TEXT frame arrived. Invalid UTF-8 has been replaced lossily.
    fn on_message(&mut self, text: &str, outbox: &mut Outbox);

    /// A BINARY frame arrived.
    fn on_binary(&mut self, _data: &[u8], _outbox: &mut Outbox) {}

    /// The peer sent CLOSE. The session replies with CLOSE and ends after this returns.
    fn on_close(&mut self, _reason: Option<&CloseReason>) {}
}

/// Creates the handler for a freshly upgraded connection.
pub trait WsHandlerFactory: Send + Sync {
    type Handler: WsHandler;

    fn create(&self, request: &HttpRequest) -> Self::Handler;
}

impl<F, H> WsHandlerFactory for F
where
    F: Fn(&HttpRequest) -> H + Send + Sync,
    H: WsHandler,
{
    type Handler = H;

    fn create(&self, request: &HttpRequest) -> H {
        (self)(request)
    }
}

/// Frames queued by a handler for the peer.
#[derive(Debug, Default)]
pub struct Outbox {
    frames: Vec<WsFrame>,
    closing: bool,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_text(&mut self, text: impl Into<String>) {
        self.push(WsFrame::text(text.into()));
    }

    pub fn send_binary(&mut self, data: impl Into<Bytes>) {
        self.push(WsFrame::binary(data));
    }

    pub fn send_ping(&mut self, data: impl Into<Bytes>) {
        self.push(WsFrame::ping(data));
    }

    pub fn send_pong(&mut self, data: impl Into<Bytes>) {
        self.push(WsFrame::pong(data));
    }

    /// Queues a CLOSE frame. Frames queued afterwards are dropped and the
    /// session ends once the outbox has been written.
    pub fn close(&mut self, code: u16, reason: &str) {
        self.push(WsFrame::close(code, reason));
        self.closing = true;
    }

    pub fn push(&mut self, frame: WsFrame) {
        if !self.closing {
            self.frames.push(frame);
        }
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Takes the queued frames, oldest first.
    pub fn drain(&mut self) -> std::vec::Drain<'_, WsFrame> {
        self.frames.drain(..)
    }
}
