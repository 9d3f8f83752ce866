//! The request handlers and the WebSocket handler the server ships with.

use std::convert::Infallible;

use tidal_http::handler::make_handler;
use tidal_http::protocol::{HttpRequest, HttpResponse};
use tidal_http::ws::{CloseReason, Outbox, WsHandler, WsHandlerFactory};
use tracing::info;

use crate::router::{ECHO_ROUTE, Router};

const ECHO_PREFIX_LEN: usize = "/echo/".len();

/// The route table of the stock server: `/`, `/echo/*` and `/user-agent`.
pub fn default_router() -> Router {
    Router::builder()
        .route("/", make_handler(root))
        .route(ECHO_ROUTE, make_handler(echo))
        .route("/user-agent", make_handler(user_agent))
        .build()
}

pub async fn root(_req: HttpRequest) -> Result<HttpResponse, Infallible> {
    Ok(HttpResponse::ok())
}

/// Replies with whatever follows `/echo/` in the path.
pub async fn echo(req: HttpRequest) -> Result<HttpResponse, Infallible> {
    let text = req.path().get(ECHO_PREFIX_LEN..).unwrap_or_default().to_string();
    Ok(plain_text(text))
}

/// Replies with the `User-Agent` header value, or an empty body when there is none.
pub async fn user_agent(req: HttpRequest) -> Result<HttpResponse, Infallible> {
    let agent = req.header("User-Agent").unwrap_or_default().to_string();
    Ok(plain_text(agent))
}

fn plain_text(body: String) -> HttpResponse {
    HttpResponse::ok()
        .header("Content-Type", mime::TEXT_PLAIN.as_ref())
        .header("Content-Length", body.len().to_string())
        .body(body)
}

/// Answers every text message with `"Echo: "` followed by the message.
#[derive(Debug, Default)]
pub struct EchoSocket {
    received: usize,
}

impl WsHandler for EchoSocket {
    fn on_message(&mut self, text: &str, outbox: &mut Outbox) {
        self.received += 1;
        outbox.send_text(format!("Echo: {text}"));
    }

    fn on_close(&mut self, reason: Option<&CloseReason>) {
        info!(received = self.received, code = reason.map(|reason| reason.code), "websocket connection closed");
    }
}

/// Creates an [`EchoSocket`] for every upgraded connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoSockets;

impl WsHandlerFactory for EchoSockets {
    type Handler = EchoSocket;

    fn create(&self, request: &HttpRequest) -> EchoSocket {
        info!(path = request.path(), "websocket connection opened");
        EchoSocket::default()
    }
}
