//! # Chunk decoder: raw bytes → discrete protocol frames.
//!
//! Standard buffered HTTP clients delay delivery of low-throughput streams
//! until an internal buffer threshold fills. This decoder reads the socket
//! directly, so every frame is delivered the moment its final byte arrives.
//!
//! Two framings are understood:
//! - **identity**: frames are newline-delimited lines;
//! - **chunked** (HTTP chunked-transfer): a hex length line, the payload,
//!   one trailing delimiter byte; a zero-length chunk ends the body.
//!
//! Carriage returns are stripped as bytes arrive, so line boundaries are
//! determined purely by `\n`. The buffer only grows via socket reads and
//! only shrinks when a complete line or payload has been consumed; partial
//! frames are never surfaced.
//!
//! Each socket wait is bounded (`read_poll`) and raced against the worker's
//! stop token, so cancellation latency stays within one poll interval even
//! on a silent stream.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;

/// Outcome of [`ChunkDecoder::next_frame`].
#[derive(Debug)]
pub(crate) enum Decoded {
    /// One complete frame, boundary bytes removed.
    Frame(Bytes),
    /// The stop token fired before a frame completed.
    Stopped,
    /// Zero-length chunk: the server ended the response body.
    End,
}

/// Outcome of one buffer fill.
enum Filled {
    /// Bytes were appended to the buffer.
    Data,
    /// The bounded readiness wait elapsed without data.
    Idle,
    /// The stop token fired.
    Stopped,
}

/// Incremental frame decoder over an unbuffered byte stream.
pub(crate) struct ChunkDecoder<S> {
    sock: S,
    buf: BytesMut,
    scratch: Vec<u8>,
    chunked: bool,
    poll: Duration,
}

impl<S: AsyncRead + Unpin> ChunkDecoder<S> {
    pub(crate) fn new(sock: S, chunked: bool, recv_size: usize, poll: Duration) -> Self {
        Self {
            sock,
            buf: BytesMut::new(),
            scratch: vec![0u8; recv_size.max(1)],
            chunked,
            poll,
        }
    }

    /// Appends bytes that were read past the response head, stripping
    /// carriage returns the same way socket reads do.
    pub(crate) fn seed(&mut self, leftover: &[u8]) {
        self.buf
            .extend(leftover.iter().copied().filter(|&b| b != b'\r'));
    }

    /// Blocks until a complete frame is available, the body ends, or the
    /// stop token fires.
    ///
    /// Identity framing returns the next non-empty line. Chunked framing
    /// parses the line as a hex length, reads exactly that many payload
    /// bytes, and discards the single delimiter byte that follows.
    pub(crate) async fn next_frame(
        &mut self,
        stop: &CancellationToken,
    ) -> Result<Decoded, StreamError> {
        loop {
            let line = match self.read_line(stop).await? {
                Some(line) => line,
                None => return Ok(Decoded::Stopped),
            };
            if line.is_empty() {
                continue;
            }
            if !self.chunked {
                return Ok(Decoded::Frame(line.freeze()));
            }

            let text = std::str::from_utf8(&line)
                .map_err(|_| StreamError::Protocol("chunk size line is not ASCII".into()))?;
            let length = usize::from_str_radix(text.trim(), 16).map_err(|_| {
                StreamError::Protocol(format!("bad chunk size line {:?}", text.trim()))
            })?;
            if length == 0 {
                return Ok(Decoded::End);
            }

            let payload = match self.read_exact(length, stop).await? {
                Some(payload) => payload,
                None => return Ok(Decoded::Stopped),
            };
            // One delimiter byte follows the payload (the CR is already gone).
            if self.read_exact(1, stop).await?.is_none() {
                return Ok(Decoded::Stopped);
            }
            return Ok(Decoded::Frame(payload));
        }
    }

    /// Blocks until the buffer contains a newline, then returns and removes
    /// everything before it. `None` means the stop token fired first.
    async fn read_line(
        &mut self,
        stop: &CancellationToken,
    ) -> Result<Option<BytesMut>, StreamError> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let mut line = self.buf.split_to(pos + 1);
                line.truncate(pos);
                return Ok(Some(line));
            }
            if matches!(self.fill(stop).await?, Filled::Stopped) {
                return Ok(None);
            }
        }
    }

    /// Blocks until the buffer holds at least `n` bytes, then returns and
    /// removes exactly `n`. `None` means the stop token fired first.
    async fn read_exact(
        &mut self,
        n: usize,
        stop: &CancellationToken,
    ) -> Result<Option<Bytes>, StreamError> {
        while self.buf.len() < n {
            if matches!(self.fill(stop).await?, Filled::Stopped) {
                return Ok(None);
            }
        }
        Ok(Some(self.buf.split_to(n).freeze()))
    }

    /// Performs one bounded-wait socket read, strips carriage returns, and
    /// appends to the buffer.
    async fn fill(&mut self, stop: &CancellationToken) -> Result<Filled, StreamError> {
        tokio::select! {
            _ = stop.cancelled() => Ok(Filled::Stopped),
            read = time::timeout(self.poll, self.sock.read(&mut self.scratch)) => match read {
                Err(_elapsed) => Ok(Filled::Idle),
                Ok(Ok(0)) => Err(StreamError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                ))),
                Ok(Ok(n)) => {
                    self.buf
                        .extend(self.scratch[..n].iter().copied().filter(|&b| b != b'\r'));
                    Ok(Filled::Data)
                }
                Ok(Err(e)) => Err(StreamError::Io(e)),
            },
        }
    }
}
