//! Stream fixtures: echo, file interleave and closed-stdout children.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::{AppError, Result};

const CHUNK_BYTES: usize = 4096;

/// Copy `input` to `output` until end-of-stream, flushing after every read.
///
/// Returns the number of bytes copied.
///
/// # Errors
///
/// Returns [`AppError::Io`] if either stream fails.
pub async fn echo<R, W>(mut input: R, mut output: W) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_BYTES];
    let mut total = 0u64;

    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n]).await?;
        output.flush().await?;
        total += n as u64;
    }

    debug!(bytes = total, "echo: end-of-stream");
    Ok(total)
}

/// Write fixed texts, without trailing newlines: `err_text` to `err`, then
/// `out_text` to `out`.
///
/// # Errors
///
/// Returns [`AppError::Io`] if either stream fails.
pub async fn print_texts<W, E>(
    out_text: &str,
    err_text: Option<&str>,
    mut out: W,
    mut err: E,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    if let Some(text) = err_text {
        err.write_all(text.as_bytes()).await?;
        err.flush().await?;
    }
    out.write_all(out_text.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

/// Interleave bytes of `input` and of the file at `path` onto `output`.
///
/// Each round copies at most one byte from `input` and then one from the
/// file, flushing after each, until both are exhausted.
///
/// # Errors
///
/// - [`AppError::Io`] if the file cannot be opened or a stream fails.
pub async fn cat_file<R, W>(input: R, path: &Path, mut output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| AppError::Io(format!("cannot open {}: {e}", path.display())))?;

    let mut input = BufReader::new(input);
    let mut file = BufReader::new(file);
    let (mut input_done, mut file_done) = (false, false);

    while !(input_done && file_done) {
        if !input_done {
            match next_byte(&mut input).await? {
                Some(byte) => write_byte(&mut output, byte).await?,
                None => input_done = true,
            }
        }
        if !file_done {
            match next_byte(&mut file).await? {
                Some(byte) => write_byte(&mut output, byte).await?,
                None => file_done = true,
            }
        }
    }

    Ok(())
}

/// Close the process's stdout, then sleep for `seconds`.
///
/// Negative or non-finite durations are treated as zero.
///
/// # Errors
///
/// Returns [`AppError::Io`] if stdout cannot be closed.
pub async fn close_stdout(seconds: f64) -> Result<()> {
    close_stdout_fd()?;

    let delay = Duration::try_from_secs_f64(seconds).unwrap_or_default();
    tokio::time::sleep(delay).await;
    Ok(())
}

#[cfg(unix)]
fn close_stdout_fd() -> Result<()> {
    use std::os::fd::AsRawFd;

    let fd = std::io::stdout().as_raw_fd();
    nix::unistd::close(fd).map_err(|e| AppError::Io(format!("close stdout: {e}")))
}

#[cfg(not(unix))]
fn close_stdout_fd() -> Result<()> {
    warn!("close-stdout: closing the standard handle is only supported on unix");
    Ok(())
}

async fn next_byte<R>(reader: &mut R) -> Result<Option<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut byte = [0u8; 1];
    match reader.read(&mut byte).await {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(byte[0])),
        Err(e) => {
            warn!(error = %e, "cat-file: read failed");
            Err(e.into())
        }
    }
}

async fn write_byte<W>(output: &mut W, byte: u8) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(&[byte]).await?;
    output.flush().await?;
    Ok(())
}
