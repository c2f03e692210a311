//! Newline-delimited JSON framing for [`DataObject`]s.
//!
//! One message per line. Shared by the TCP client and the daemon's listener.

use ctx_types::DataObject;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{TransportError, TransportResult};

/// Longest line [`read_message`] accepts, newline excluded.
pub const MAX_MESSAGE: usize = 1024 * 1024;

/// Read the next message, or `None` at end of stream.
pub async fn read_message<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> TransportResult<Option<DataObject>>
where
    R: AsyncBufRead + Unpin,
{
    read_message_within(reader, buf, MAX_MESSAGE).await
}

/// Like [`read_message`] with a caller-chosen line limit.
///
/// An overlong line fails with [`TransportError::MessageTooLarge`] and leaves the
/// stream mid-line, so the caller should drop the connection.
pub async fn read_message_within<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> TransportResult<Option<DataObject>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        buf.clear();
        let mut bounded = (&mut *reader).take(limit as u64 + 1);
        let read = bounded.read_until(b'\n', buf).await?;
        if read == 0 {
            return Ok(None);
        }
        if buf.len() > limit && !buf.ends_with(b"\n") {
            return Err(TransportError::MessageTooLarge(limit));
        }

        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }
        return Ok(Some(serde_json::from_slice(line)?));
    }
}

pub async fn write_message<W>(writer: &mut W, message: &DataObject) -> TransportResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

pub fn encode(message: &DataObject) -> TransportResult<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

pub fn decode(bytes: &[u8]) -> TransportResult<DataObject> {
    Ok(serde_json::from_slice(bytes)?)
}
