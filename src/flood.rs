//! Flood engine and first-byte probe.
//!
//! A flood pushes exactly `size` bytes through a [`DuplexChannel`] in
//! chunks of at most [`params::CHUNK_SIZE`], while a receiver concurrently
//! sums the acknowledgment frames coming back. The flood succeeds once
//! every byte is written and at least `size` bytes are acknowledged.

use std::ops::Range;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ack;
use crate::channel::DuplexChannel;
use crate::error::{MeterError, Result};
use crate::params;
use crate::payload::Payload;

/// Byte ranges of the payload written for a transfer of `size` bytes.
///
/// Yields `ceil(size / CHUNK_SIZE)` ranges, each at most
/// [`params::CHUNK_SIZE`] long, covering `0..size` in order.
pub fn chunks(size: usize) -> impl Iterator<Item = Range<usize>> {
    (0..size)
        .step_by(params::CHUNK_SIZE)
        .map(move |start| start..size.min(start + params::CHUNK_SIZE))
}

/// Transfer `size` bytes of `payload` over `channel` and wait until the
/// peer has acknowledged all of them.
///
/// Sender and receiver run concurrently. If either fails the other is
/// dropped, so a broken write never leaves the receiver waiting for
/// acknowledgments that will not come.
///
/// # Panics
///
/// Panics if `size` exceeds the payload length.
pub async fn flood<C>(channel: &mut C, payload: &Payload, size: usize) -> Result<()>
where
    C: DuplexChannel + ?Sized,
{
    assert!(size <= payload.len(), "payload smaller than transfer");
    if size == 0 {
        return Ok(());
    }

    let (mut reader, mut writer) = channel.halves();
    let (_, received) = tokio::try_join!(
        send(&mut writer, payload, size),
        receive(&mut reader, size)
    )?;

    tracing::trace!(size, received, "flood complete");
    Ok(())
}

async fn send<W>(writer: &mut W, payload: &Payload, size: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for chunk in chunks(size) {
        writer.write_all(payload.bytes(chunk.start, chunk.len())).await?;
    }
    writer.flush().await?;
    Ok(())
}

async fn receive<R>(reader: &mut R, size: usize) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut received = 0;
    let mut stalled = 0;
    let mut frame = [0u8; params::ACK_FRAME_LEN];

    while received < size {
        reader.read_exact(&mut frame).await?;
        match ack::decode(&frame) {
            Some(n) if n > 0 => {
                received += n;
                stalled = 0;
            }
            _ => {
                stalled += 1;
                tracing::debug!(?frame, stalled, "acknowledgment without a byte count");
                if stalled >= params::MAX_STALLED_ACKS {
                    return Err(MeterError::StalledAcks(stalled));
                }
            }
        }
    }

    Ok(received)
}

/// Send one byte and wait for one acknowledgment frame.
///
/// Only used to timestamp when the peer starts answering; failures are
/// logged and otherwise ignored.
pub async fn first_byte<C>(channel: &mut C)
where
    C: DuplexChannel + ?Sized,
{
    if let Err(e) = probe(channel).await {
        tracing::debug!("first byte probe failed: {e}");
    }
}

async fn probe<C>(channel: &mut C) -> Result<()>
where
    C: DuplexChannel + ?Sized,
{
    let (mut reader, mut writer) = channel.halves();
    writer.write_all(&[0u8]).await?;
    writer.flush().await?;

    let mut reply = [0u8; params::ACK_FRAME_LEN];
    reader.read_exact(&mut reply).await?;
    Ok(())
}
