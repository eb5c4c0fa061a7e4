//! The duplex channel every stream transport is measured through.
//!
//! A flood needs to write and read the same channel at the same time, so a
//! channel hands out a read half and a write half that both borrow it for
//! the duration of one transfer. The owner of the underlying connection
//! closes it; floods never do.

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

/// A bidirectional byte channel that can be split for one transfer.
pub trait DuplexChannel: Send {
    /// Read side, borrowed from the channel.
    type Reader<'a>: AsyncRead + Unpin + Send
    where
        Self: 'a;
    /// Write side, borrowed from the channel.
    type Writer<'a>: AsyncWrite + Unpin + Send
    where
        Self: 'a;

    /// Borrow both halves at once.
    fn halves(&mut self) -> (Self::Reader<'_>, Self::Writer<'_>);
}

// TCP, TLS-over-TCP and in-memory pipes are all a single object that is
// both readable and writable.
impl<S> DuplexChannel for S
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    type Reader<'a>
        = ReadHalf<&'a mut S>
    where
        S: 'a;
    type Writer<'a>
        = WriteHalf<&'a mut S>
    where
        S: 'a;

    fn halves(&mut self) -> (Self::Reader<'_>, Self::Writer<'_>) {
        tokio::io::split(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn halves_share_the_stream() {
        let (mut local, mut remote) = tokio::io::duplex(64);

        {
            let (_, mut w) = local.halves();
            w.write_all(b"ping").await.unwrap();
        }
        let mut buf = [0u8; 4];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        remote.write_all(b"pong").await.unwrap();
        let (mut r, _) = local.halves();
        r.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }
}
