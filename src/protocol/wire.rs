//! Length-prefixed framing: `[4 bytes big-endian u32][payload]`.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{GuardError, ProtocolErrorKind};

/// Read one frame, rejecting anything longer than `max_size`.
///
/// A clean EOF before the length prefix is reported as `ConnectionClosed`.
pub async fn read_message<R>(reader: &mut R, max_size: usize) -> Result<Vec<u8>, GuardError>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut len_buf).await {
        return Err(if e.kind() == std::io::ErrorKind::UnexpectedEof {
            GuardError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            }
        } else {
            GuardError::Io(e)
        });
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(GuardError::Protocol {
            kind: ProtocolErrorKind::MessageTooLarge {
                size: len,
                max: max_size,
            },
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write one frame.
pub async fn write_message<W>(writer: &mut W, data: &[u8]) -> Result<(), GuardError>
where
    W: AsyncWriteExt + Unpin,
{
    let len = u32::try_from(data.len()).map_err(|_| GuardError::Protocol {
        kind: ProtocolErrorKind::MessageTooLarge {
            size: data.len(),
            max: u32::MAX as usize,
        },
    })?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// [`read_message`] bounded by `timeout_duration`.
pub async fn read_message_with_timeout<R>(
    reader: &mut R,
    max_size: usize,
    timeout_duration: Duration,
) -> Result<Vec<u8>, GuardError>
where
    R: AsyncReadExt + Unpin,
{
    timeout(timeout_duration, read_message(reader, max_size))
        .await
        .map_err(|_| timed_out())?
}

/// [`write_message`] bounded by `timeout_duration`.
pub async fn write_message_with_timeout<W>(
    writer: &mut W,
    data: &[u8],
    timeout_duration: Duration,
) -> Result<(), GuardError>
where
    W: AsyncWriteExt + Unpin,
{
    timeout(timeout_duration, write_message(writer, data))
        .await
        .map_err(|_| timed_out())?
}

fn timed_out() -> GuardError {
    GuardError::Protocol {
        kind: ProtocolErrorKind::ConnectionTimeout,
    }
}
