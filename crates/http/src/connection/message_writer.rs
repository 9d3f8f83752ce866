use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::ResponseEncoder;
use crate::protocol::{HttpResponse, SendError};
use crate::ws::WsFrame;

/// Buffers serialized replies and frames until the connection flushes them.
///
/// Items are written in the order they are queued; a failed write is not
/// retried and ends the connection.
#[derive(Debug)]
pub struct MessageWriter<W> {
    writer: W,
    buffer: BytesMut,
    encoder: ResponseEncoder,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn with_capacity(writer: W, buffer_size: usize) -> Self {
        Self { writer, buffer: BytesMut::with_capacity(buffer_size), encoder: ResponseEncoder::new() }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn write_response(&mut self, response: HttpResponse) -> Result<(), SendError> {
        self.encoder.encode(response, &mut self.buffer)
    }

    #[inline]
    pub fn write_frame(&mut self, frame: &WsFrame) {
        frame.encode_to(&mut self.buffer);
    }

    pub async fn flush(&mut self) -> Result<(), SendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        trace!(bytes = self.buffer.len(), "flushing to peer");
        let result = self.writer.write_all(&self.buffer).await;
        self.buffer.clear();
        result?;
        Ok(self.writer.flush().await?)
    }

    pub async fn shutdown(&mut self) -> Result<(), SendError> {
        self.flush().await?;
        Ok(self.writer.shutdown().await?)
    }
}
