//! Newline framing for the agent pipe protocol.
//!
//! Frames on raw bytes so that no single inbound line can end the stream:
//!
//! - invalid UTF-8 is decoded lossily (`U+FFFD` replacement characters);
//! - a line longer than the limit is yielded once, truncated to the limit,
//!   and the rest of it up to the next `\n` is discarded.
//!
//! A trailing `\r` is stripped from inbound lines.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::protocol::message::{encode, Message};
use crate::{AppError, Result};

/// Default maximum inbound line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line codec for protocol streams.
///
/// Decodes raw lines (not [`Message`]s): the inbound trace must record every
/// line verbatim, including ones that fail to decode.
#[derive(Debug)]
pub struct ProtocolCodec {
    max_line_bytes: usize,
    // Bytes already searched for `\n` in the buffered partial line.
    next_index: usize,
    // Inside the tail of an over-long line that was already yielded.
    discarding: bool,
}

impl ProtocolCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_bytes(MAX_LINE_BYTES)
    }

    /// Create a codec truncating inbound lines longer than `max_line_bytes`.
    #[must_use]
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes: max_line_bytes.max(1),
            next_index: 0,
            discarding: false,
        }
    }
}

impl Default for ProtocolCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn to_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    match std::str::from_utf8(raw) {
        Ok(line) => line.to_owned(),
        Err(err) => {
            warn!(%err, "codec: inbound line is not valid utf-8, decoding lossily");
            String::from_utf8_lossy(raw).into_owned()
        }
    }
}

impl Decoder for ProtocolCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let read_to = src.len().min(self.max_line_bytes.saturating_add(1));
            let newline = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    src.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = src.split_to(end + 1);
                    return Ok(Some(to_line(&line[..end])));
                }
                (false, None) if src.len() > self.max_line_bytes => {
                    let line = src.split_to(self.max_line_bytes);
                    self.discarding = true;
                    self.next_index = 0;
                    warn!(
                        max_line_bytes = self.max_line_bytes,
                        "codec: inbound line too long, truncating"
                    );
                    return Ok(Some(to_line(&line)));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    /// A final line without `\n` is still yielded at end-of-stream.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        self.next_index = 0;
        if self.discarding {
            self.discarding = false;
            src.clear();
            return Ok(None);
        }
        if src.is_empty() {
            return Ok(None);
        }

        let line = src.split_to(src.len());
        Ok(Some(to_line(&line)))
    }
}

impl Encoder<&Message> for ProtocolCodec {
    type Error = AppError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<String>>::encode(self, encode(item), dst)
    }
}

impl Encoder<String> for ProtocolCodec {
    type Error = AppError;

    /// Raw lines are used for traces and fixture output that bypass [`Message`].
    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
