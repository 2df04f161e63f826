//! Length-prefixed envelope frames over any async byte stream.
//!
//! Each frame is a big-endian `u32` length followed by that many bytes of
//! encoded envelope.

use crate::domain::envelope::{NetworkEnvelope, MAX_FRAME_SIZE};
use crate::domain::errors::EnvelopeError;
use crate::service::codec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), EnvelopeError>
where
    W: AsyncWrite + Unpin,
{
    if frame.len() > MAX_FRAME_SIZE {
        return Err(EnvelopeError::FrameTooLarge {
            len: frame.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    writer.write_all(&(frame.len() as u32).to_be_bytes()).await?;
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. `Ok(None)` means the peer closed the stream between
/// frames.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>, EnvelopeError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_len {
        return Err(EnvelopeError::FrameTooLarge { len, max: max_len });
    }
    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Ok(Some(frame))
}

pub async fn write_envelope<W>(writer: &mut W, envelope: &NetworkEnvelope) -> Result<usize, EnvelopeError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = codec::encode(envelope)?;
    write_frame(writer, &bytes).await?;
    Ok(bytes.len())
}

/// Read and decode one envelope, with its encoded size.
pub async fn read_envelope<R>(reader: &mut R) -> Result<Option<(NetworkEnvelope, usize)>, EnvelopeError>
where
    R: AsyncRead + Unpin,
{
    match read_frame(reader, MAX_FRAME_SIZE).await? {
        Some(frame) => Ok(Some((codec::decode(&frame)?, frame.len()))),
        None => Ok(None),
    }
}
