//! Wait announcer: lifecycle-only driver.
//!
//! Sends `<id>W#` for agents `1..=count` and then holds the stream open for a
//! delay, without ever reading. A supervisor under test must fan out all wait
//! notifications before any agent produces output.

use std::time::Duration;

use tokio::io::AsyncWrite;
use tracing::debug;

use crate::protocol::message::Message;
use crate::protocol::writer::MessageWriter;
use crate::Result;

/// Agent count from a raw command-line value: non-positive counts announce
/// nothing, counts beyond `u32::MAX` saturate.
#[must_use]
pub fn clamp_count(raw: i64) -> u32 {
    u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
}

/// Announce agents `1..=count` as waiting, then sleep for `delay`.
///
/// # Errors
///
/// Returns [`crate::AppError::Io`] if the data stream cannot be written.
pub async fn announce_waits<W>(data_out: W, count: u32, delay: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = MessageWriter::new(data_out);

    for agent_id in 1..=count {
        out.send(&Message::Wait { agent_id }).await?;
    }

    debug!(count, ?delay, "announcer: holding");
    tokio::time::sleep(delay).await;
    Ok(())
}
