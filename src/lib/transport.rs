use core::time::Duration;
use std::io;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no connection to device")]
    Unavailable,
    #[error("incomplete response: got {received} of {expected} bytes")]
    Incomplete { received: usize, expected: usize },
    #[error("timed out waiting for device response")]
    TimedOut,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Half-duplex byte link to a device, typically a USB-serial adapter.
///
/// `recv` hands back whatever the link delivered, in arbitrary chunk sizes;
/// `None` means the stream has ended.
#[async_trait]
pub trait ByteTransport: Send {
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;
    async fn recv(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Tells the accumulator how long the frame being received is.
pub trait FrameLength {
    /// Number of bytes that make up the frame, judged from the bytes
    /// received so far.
    fn needed(&self, received: &[u8]) -> usize;
}

/// Concatenates transport chunks until `frame` reports the buffer complete.
///
/// Every read is bounded by `read_timeout`. A stream that ends early yields
/// [`TransportError::Incomplete`].
pub async fn accumulate<T, F>(transport: &mut T, frame: &F, read_timeout: Duration) -> Result<Vec<u8>>
where
    T: ByteTransport + ?Sized,
    F: FrameLength + ?Sized,
{
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        let expected = frame.needed(&buffer);
        if buffer.len() >= expected {
            return Ok(buffer);
        }

        match timeout(read_timeout, transport.recv()).await {
            Ok(Ok(Some(chunk))) => {
                debug!("chunk {:02x?}", chunk);
                buffer.extend_from_slice(&chunk);
            }
            Ok(Ok(None)) => {
                debug!("stream closed after {} bytes", buffer.len());
                return Err(TransportError::Incomplete {
                    received: buffer.len(),
                    expected,
                });
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                debug!("accumulate timeout, have {:02x?}", buffer);
                return Err(TransportError::TimedOut);
            }
        }
    }
}

/// [`ByteTransport`] over any tokio byte stream, e.g. a `tokio_serial::SerialStream`.
pub struct StreamTransport<S> {
    stream: S,
    buf: [u8; 256],
}

impl<S> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: [0u8; 256],
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[async_trait]
impl<S> ByteTransport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        let n = self.stream.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf[..n].to_vec()))
    }
}
