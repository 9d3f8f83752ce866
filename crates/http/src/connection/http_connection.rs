use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{ByteAccumulator, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEADER_BYTES, DEFAULT_READ_CAPACITY, HttpFramer};
use crate::connection::message_writer::MessageWriter;
use crate::handler::Handler;
use crate::protocol::{HttpError, HttpRequest, HttpResponse, ParseError, WsError};
use crate::ws::handshake::{handshake_response, is_upgrade_request};
use crate::ws::{CloseReason, DEFAULT_MAX_PAYLOAD, FrameCodec, OpCode, Outbox, WsFrame, WsHandler, WsHandlerFactory};

/// Which protocol a connection currently speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Http,
    WebSocket,
    Closed,
}

/// Buffer sizes and framing limits of one connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    pub read_capacity: usize,
    pub write_capacity: usize,
    pub max_header_bytes: usize,
    pub max_body_bytes: u64,
    pub max_frame_payload: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_capacity: DEFAULT_READ_CAPACITY,
            write_capacity: DEFAULT_READ_CAPACITY,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_frame_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// One accepted connection, from its first request until it closes.
///
/// `HttpConnection` owns the socket halves and the receive buffer exclusively:
/// - Pipelined requests are framed out of the buffer and answered in arrival order
/// - An upgrade request is answered with `101 Switching Protocols`, after which the
///   same buffer is framed as WebSocket frames
/// - Reads returning no bytes, or failing, close the connection
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    reader: R,
    writer: MessageWriter<W>,
    accumulator: ByteAccumulator,
    http_framer: HttpFramer,
    frame_codec: FrameCodec,
    state: ConnectionState,
}

/// What the session does after a frame has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, ConnectionConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: ConnectionConfig) -> Self {
        Self {
            reader,
            writer: MessageWriter::with_capacity(writer, config.write_capacity),
            accumulator: ByteAccumulator::with_capacity(config.read_capacity),
            http_framer: HttpFramer::with_limits(config.max_header_bytes, config.max_body_bytes),
            frame_codec: FrameCodec::with_max_payload(config.max_frame_payload),
            state: ConnectionState::Http,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Serves the connection until the peer leaves, a close handshake completes,
    /// or an unrecoverable framing error occurs.
    pub async fn process<H, F>(mut self, handler: Arc<H>, ws_factory: Arc<F>) -> Result<(), HttpError>
    where
        H: Handler + ?Sized,
        F: WsHandlerFactory + ?Sized,
    {
        let Some(upgrade_request) = self.serve_http(handler.as_ref()).await? else {
            return Ok(());
        };

        let ws_handler = ws_factory.create(&upgrade_request);
        self.serve_websocket(ws_handler).await
    }

    /// Runs the HTTP loop, returning the upgrade request if the connection switched protocols.
    async fn serve_http<H>(&mut self, handler: &H) -> Result<Option<HttpRequest>, HttpError>
    where
        H: Handler + ?Sized,
    {
        loop {
            loop {
                let framer = self.http_framer;
                let request = match self.accumulator.peek_complete(|buf| framer.request_len(buf)).and_then(|raw| raw.map(|raw| framer.parse(raw)).transpose()) {
                    Ok(Some(request)) => request,
                    Ok(None) => break,
                    Err(e) => return Err(self.reject(e).await),
                };

                debug!(method = %request.method(), path = request.path(), "received request");

                if is_upgrade_request(&request) {
                    info!(path = request.path(), "switching protocols to websocket");
                    self.writer.write_response(handshake_response(&request))?;
                    self.writer.flush().await?;
                    self.state = ConnectionState::WebSocket;
                    return Ok(Some(request));
                }

                let response = match handler.call(request).await {
                    Ok(response) => response,
                    Err(e) => {
                        error!("handle request error, cause: {}", e);
                        HttpResponse::internal_error()
                    }
                };
                if let Err(e) = self.writer.write_response(response) {
                    error!("encode response error, cause: {}", e);
                    self.writer.write_response(HttpResponse::internal_error())?;
                }
            }

            self.writer.flush().await?;

            if !self.fill().await {
                self.close().await;
                return Ok(None);
            }
        }
    }

    async fn serve_websocket<S>(&mut self, mut handler: S) -> Result<(), HttpError>
    where
        S: WsHandler,
    {
        let mut outbox = Outbox::new();

        loop {
            loop {
                let codec = self.frame_codec;
                let frame = match self.accumulator.peek_complete(|buf| codec.frame_len(buf)).and_then(|raw| raw.map(WsFrame::parse).transpose()) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => return Err(self.fail_websocket(e).await),
                };

                let flow = dispatch(frame, &mut handler, &mut outbox);
                for frame in outbox.drain() {
                    self.writer.write_frame(&frame);
                }

                if flow == Flow::Close || outbox.is_closing() {
                    if !self.accumulator.is_empty() {
                        debug!(discarded = self.accumulator.len(), "discarding bytes received after close");
                        self.accumulator.clear();
                    }
                    self.writer.flush().await?;
                    self.close().await;
                    return Ok(());
                }
            }

            self.writer.flush().await?;

            if !self.fill().await {
                self.close().await;
                return Ok(());
            }
        }
    }

    /// Reads once into the accumulator. `false` means the connection is over.
    async fn fill(&mut self) -> bool {
        match self.accumulator.read_from(&mut self.reader).await {
            Ok(0) => {
                info!(state = ?self.state, "peer closed connection");
                false
            }
            Ok(n) => {
                trace!(n, buffered = self.accumulator.len(), "read from peer");
                true
            }
            Err(e) => {
                info!(state = ?self.state, cause = %e, "peer closed connection");
                false
            }
        }
    }

    /// Answers a request that cannot be framed or parsed, then gives up on the connection.
    async fn reject(&mut self, e: ParseError) -> HttpError {
        warn!(cause = %e, "malformed request, closing connection");

        let response = HttpResponse::with_status(e.status_code());
        if let Err(send_error) = self.writer.write_response(response) {
            debug!(cause = %send_error, "can't encode error response");
        } else if let Err(send_error) = self.writer.flush().await {
            debug!(cause = %send_error, "can't send error response");
        }

        self.close().await;
        e.into()
    }

    /// Reports a framing error to the peer with a CLOSE frame, then gives up on the connection.
    async fn fail_websocket(&mut self, e: WsError) -> HttpError {
        warn!(cause = %e, "websocket protocol error, closing connection");

        self.writer.write_frame(&WsFrame::close(e.close_code(), ""));
        if let Err(send_error) = self.writer.flush().await {
            debug!(cause = %send_error, "can't send close frame");
        }

        self.close().await;
        e.into()
    }

    async fn close(&mut self) {
        self.state = ConnectionState::Closed;
        if let Err(e) = self.writer.shutdown().await {
            debug!(cause = %e, "shutdown writer error");
        }
    }
}

fn dispatch<S>(frame: WsFrame, handler: &mut S, outbox: &mut Outbox) -> Flow
where
    S: WsHandler,
{
    trace!(opcode = ?frame.opcode(), fin = frame.fin(), len = frame.payload_len(), "received frame");

    match frame.opcode() {
        OpCode::Text => handler.on_message(&String::from_utf8_lossy(frame.payload()), outbox),
        OpCode::Binary => handler.on_binary(frame.payload(), outbox),
        OpCode::Ping => outbox.send_pong(frame.into_payload()),
        OpCode::Pong => {}
        OpCode::Close => {
            let reason = frame.close_reason();
            handler.on_close(reason.as_ref());
            outbox.close(reason.map_or(CloseReason::NORMAL, |reason| reason.code), "");
            return Flow::Close;
        }
        OpCode::Continuation => debug!("ignoring continuation frame, fragmented messages are not reassembled"),
    }

    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use crate::protocol::SendError;
    use bytes::Bytes;
    use futures::StreamExt;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
    use tokio::task::JoinHandle;
    use tokio_util::codec::FramedRead;

    struct EchoSocket {
        closed_with: Arc<std::sync::Mutex<Option<Option<CloseReason>>>>,
    }

    impl WsHandler for EchoSocket {
        fn on_message(&mut self, text: &str, outbox: &mut Outbox) {
            if text == "quit" {
                outbox.close(CloseReason::GOING_AWAY, "bye");
            } else {
                outbox.send_text(format!("Echo: {text}"));
            }
        }

        fn on_binary(&mut self, data: &[u8], outbox: &mut Outbox) {
            outbox.send_binary(Bytes::copy_from_slice(data));
        }

        fn on_close(&mut self, reason: Option<&CloseReason>) {
            *self.closed_with.lock().unwrap() = Some(reason.cloned());
        }
    }

    type Closed = Arc<std::sync::Mutex<Option<Option<CloseReason>>>>;

    fn start() -> (DuplexStream, JoinHandle<Result<(), HttpError>>, Closed) {
        start_with(ConnectionConfig::default())
    }

    fn start_with(config: ConnectionConfig) -> (DuplexStream, JoinHandle<Result<(), HttpError>>, Closed) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);

        let handler = Arc::new(make_handler(|req: HttpRequest| async move {
            match req.path() {
                "/fail" => Err(io::Error::other("handler failed")),
                "/split" => Ok(HttpResponse::ok().header("X-Split", "a\r\nb")),
                path => Ok(HttpResponse::ok().body(format!("{} {}", req.method(), path))),
            }
        }));

        let closed: Closed = Arc::default();
        let factory_closed = Arc::clone(&closed);
        let factory = Arc::new(move |_req: &HttpRequest| EchoSocket { closed_with: Arc::clone(&factory_closed) });

        let connection = HttpConnection::with_config(reader, writer, config);
        let task = tokio::spawn(connection.process(handler, factory));
        (client, task, closed)
    }

    async fn exchange(input: &[u8]) -> (String, Result<(), HttpError>) {
        let (mut client, task, _) = start();
        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();

        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        (String::from_utf8(output).unwrap(), task.await.unwrap())
    }

    const UPGRADE: &[u8] = b"GET /chat HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n";

    async fn read_head(reader: &mut ReadHalf<DuplexStream>) -> String {
        let mut head = Vec::new();
        while !head.ends_with(b"\r\n\r\n") {
            head.push(reader.read_u8().await.unwrap());
        }
        String::from_utf8(head).unwrap()
    }

    async fn upgrade() -> (FramedRead<ReadHalf<DuplexStream>, FrameCodec>, WriteHalf<DuplexStream>, JoinHandle<Result<(), HttpError>>, Closed) {
        let (client, task, closed) = start();
        let (mut reader, mut writer) = tokio::io::split(client);

        writer.write_all(UPGRADE).await.unwrap();
        let head = read_head(&mut reader).await;
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(head.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));

        (FramedRead::new(reader, FrameCodec::new()), writer, task, closed)
    }

    async fn send(writer: &mut WriteHalf<DuplexStream>, frame: WsFrame) {
        writer.write_all(&frame.masked([0x12, 0x34, 0x56, 0x78]).to_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn pipelined_requests_answered_in_order() {
        let (output, result) = exchange(b"GET /first HTTP/1.1\r\n\r\nPOST /second HTTP/1.1\r\nContent-Length: 2\r\n\r\nhiGET /third HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(
            output,
            "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nGET /first\
             HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nPOST /second\
             HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nGET /third"
        );
    }

    #[tokio::test]
    async fn byte_by_byte_delivery() {
        let (mut client, task, _) = start();
        for byte in b"GET /slow HTTP/1.1\r\nUser-Agent: test-agent\r\n\r\n" {
            client.write_all(&[*byte]).await.unwrap();
            tokio::task::yield_now().await;
        }
        client.shutdown().await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        assert_eq!(output, "HTTP/1.1 200 OK\r\nContent-Length: 9\r\n\r\nGET /slow");
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn handler_error_becomes_500() {
        let (output, result) = exchange(b"GET /fail HTTP/1.1\r\n\r\nGET /after HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(output, "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nGET /after");
    }

    #[tokio::test]
    async fn malformed_content_length_fails_connection() {
        let (output, result) = exchange(b"GET /ok HTTP/1.1\r\n\r\nPOST / HTTP/1.1\r\nContent-Length: many\r\n\r\n").await;

        assert!(output.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(output.ends_with("HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n"));
        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::InvalidContentLength { .. } })));
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let config = ConnectionConfig { max_body_bytes: 8, ..ConnectionConfig::default() };
        let (mut client, task, _) = start_with(config);
        client.write_all(b"POST / HTTP/1.1\r\nContent-Length: 9\r\n\r\n").await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        assert_eq!(output, "HTTP/1.1 413 Payload Too Large\r\nContent-Length: 0\r\n\r\n");
        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn websocket_echo_ping_and_close() {
        let (mut frames, mut writer, task, closed) = upgrade().await;

        send(&mut writer, WsFrame::text("hello")).await;
        let reply = frames.next().await.unwrap().unwrap();
        assert_eq!(reply.opcode(), OpCode::Text);
        assert!(reply.fin());
        assert!(!reply.is_masked());
        assert_eq!(&reply.payload()[..], b"Echo: hello");

        send(&mut writer, WsFrame::ping("are you there")).await;
        let reply = frames.next().await.unwrap().unwrap();
        assert_eq!(reply.opcode(), OpCode::Pong);
        assert_eq!(&reply.payload()[..], b"are you there");

        send(&mut writer, WsFrame::binary(vec![1_u8; 70_000])).await;
        let reply = frames.next().await.unwrap().unwrap();
        assert_eq!(reply.opcode(), OpCode::Binary);
        assert_eq!(reply.payload_len(), 70_000);

        send(&mut writer, WsFrame::close(CloseReason::NORMAL, "done")).await;
        let reply = frames.next().await.unwrap().unwrap();
        assert_eq!(reply.opcode(), OpCode::Close);
        assert_eq!(reply.close_reason(), Some(CloseReason::new(CloseReason::NORMAL, "")));
        assert!(frames.next().await.is_none());

        assert!(task.await.unwrap().is_ok());
        assert_eq!(*closed.lock().unwrap(), Some(Some(CloseReason::new(1000, "done"))));
    }

    #[tokio::test]
    async fn frames_sent_with_upgrade_request_are_kept() {
        let (client, task, _) = start();
        let (mut reader, mut writer) = tokio::io::split(client);

        let mut input = UPGRADE.to_vec();
        input.extend_from_slice(&WsFrame::text("early").masked([1, 2, 3, 4]).to_bytes());
        writer.write_all(&input).await.unwrap();

        read_head(&mut reader).await;
        let mut frames = FramedRead::new(reader, FrameCodec::new());
        let reply = frames.next().await.unwrap().unwrap();
        assert_eq!(&reply.payload()[..], b"Echo: early");

        send(&mut writer, WsFrame::text("quit")).await;
        let reply = frames.next().await.unwrap().unwrap();
        assert_eq!(reply.close_reason(), Some(CloseReason::new(CloseReason::GOING_AWAY, "bye")));
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn continuation_and_pong_are_ignored() {
        let (mut frames, mut writer, task, _) = upgrade().await;

        send(&mut writer, WsFrame::new(OpCode::Continuation, Bytes::from_static(b"tail"), true)).await;
        send(&mut writer, WsFrame::pong("late")).await;
        send(&mut writer, WsFrame::text("next")).await;

        let reply = frames.next().await.unwrap().unwrap();
        assert_eq!(&reply.payload()[..], b"Echo: next");

        writer.shutdown().await.unwrap();
        assert!(frames.next().await.is_none());
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn protocol_error_closes_with_1002() {
        let (mut frames, mut writer, task, _) = upgrade().await;

        writer.write_all(&[0x83, 0x80, 0, 0, 0, 0]).await.unwrap();

        let reply = frames.next().await.unwrap().unwrap();
        assert_eq!(reply.close_reason().map(|reason| reason.code), Some(CloseReason::PROTOCOL_ERROR));
        assert!(matches!(task.await.unwrap(), Err(HttpError::WebSocketError { source: WsError::InvalidOpcode(0x3) })));
    }

    #[tokio::test]
    async fn plain_request_is_not_upgraded() {
        let (output, result) = exchange(b"GET /chat HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(output.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn unencodable_reply_becomes_500_after_earlier_replies() {
        let (output, result) = exchange(b"GET /a HTTP/1.1\r\n\r\nGET /split HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(
            output,
            "HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nGET /a\
             HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n\
             HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nGET /b"
        );
    }

    #[tokio::test]
    async fn bytes_after_close_are_discarded() {
        let (mut frames, mut writer, task, closed) = upgrade().await;

        let mut input = WsFrame::close(CloseReason::NORMAL, "").masked([5, 6, 7, 8]).to_bytes().to_vec();
        input.extend_from_slice(&WsFrame::text("too late").masked([5, 6, 7, 8]).to_bytes());
        writer.write_all(&input).await.unwrap();

        let reply = frames.next().await.unwrap().unwrap();
        assert_eq!(reply.opcode(), OpCode::Close);
        assert_eq!(reply.close_reason(), Some(CloseReason::new(CloseReason::NORMAL, "")));
        assert!(frames.next().await.is_none());

        assert!(task.await.unwrap().is_ok());
        assert_eq!(*closed.lock().unwrap(), Some(Some(CloseReason::new(CloseReason::NORMAL, ""))));
    }

    struct BrokenPipe {
        writes: Arc<AtomicUsize>,
    }

    impl AsyncWrite for BrokenPipe {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn failed_write_ends_connection_without_retry() {
        let writes = Arc::new(AtomicUsize::new(0));
        let writer = BrokenPipe { writes: Arc::clone(&writes) };
        let reader: &[u8] = b"GET /first HTTP/1.1\r\n\r\nGET /second HTTP/1.1\r\n\r\n";

        let handler = Arc::new(make_handler(|_req: HttpRequest| async { Ok::<_, io::Error>(HttpResponse::ok()) }));
        let factory = Arc::new(|_req: &HttpRequest| EchoSocket { closed_with: Arc::default() });

        let result = HttpConnection::new(reader, writer).process(handler, factory).await;

        assert!(matches!(result, Err(HttpError::ResponseError { source: SendError::Io { .. } })));
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }
}
