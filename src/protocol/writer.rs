//! Outbound line writer.
//!
//! Every line is written and flushed before the call returns: the supervisor
//! on the other side may block on a partial read, so nothing may linger in a
//! buffer between protocol actions.

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tracing::{trace, warn};

use crate::protocol::codec::ProtocolCodec;
use crate::protocol::message::Message;
use crate::{AppError, Result};

/// Writer of newline-terminated lines to an outbound stream.
pub struct MessageWriter<W> {
    inner: W,
    codec: ProtocolCodec,
    buf: BytesMut,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            codec: ProtocolCodec::new(),
            buf: BytesMut::new(),
        }
    }

    /// Encode `msg`, write it followed by `\n`, and flush.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the write or flush fails (e.g. the reading
    /// side has closed the pipe).
    pub async fn send(&mut self, msg: &Message) -> Result<()> {
        trace!(line = %msg, "writer: send");
        self.codec.encode(msg, &mut self.buf)?;
        self.flush_buf().await
    }

    /// Write a raw text line followed by `\n`, and flush.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the write or flush fails.
    pub async fn send_line(&mut self, line: impl Into<String>) -> Result<()> {
        let line: String = line.into();
        self.codec.encode(line, &mut self.buf)?;
        self.flush_buf().await
    }

    async fn flush_buf(&mut self) -> Result<()> {
        let bytes = self.buf.split();
        self.inner.write_all(&bytes).await.map_err(|e| {
            warn!(error = %e, "writer: write failed");
            AppError::Io(format!("write failed: {e}"))
        })?;
        self.inner
            .flush()
            .await
            .map_err(|e| AppError::Io(format!("flush failed: {e}")))
    }
}
