//! Inbound line reader.
//!
//! Drives a [`FramedRead`] backed by [`ProtocolCodec`] and hands out one line
//! at a time. Reads suspend until a full line or end-of-stream arrives; callers
//! must check for `Ok(None)` after every read.

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::protocol::codec::ProtocolCodec;
use crate::Result;

/// Sequential reader of protocol lines from an inbound stream.
pub struct LineReader<R> {
    framed: FramedRead<R, ProtocolCodec>,
    exhausted: bool,
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wrap `inner` using the default line limit.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self::with_codec(inner, ProtocolCodec::new())
    }

    /// Wrap `inner` using an explicit codec.
    #[must_use]
    pub fn with_codec(inner: R, codec: ProtocolCodec) -> Self {
        Self {
            framed: FramedRead::new(inner, codec),
            exhausted: false,
        }
    }

    /// Read the next line.
    ///
    /// Returns `Ok(None)` at end-of-stream and on every call after it.
    ///
    /// Undecodable and over-long lines are yielded like any other line (see
    /// [`ProtocolCodec`]); only the stream itself can fail.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::Io`] on failures of the underlying stream.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        if self.exhausted {
            return Ok(None);
        }

        match self.framed.next().await {
            None => {
                debug!("line reader: end-of-stream");
                self.exhausted = true;
                Ok(None)
            }
            Some(Err(err)) => Err(err),
            Some(Ok(line)) => Ok(Some(line)),
        }
    }

    /// Whether end-of-stream has been observed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
