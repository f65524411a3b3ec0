//! Buffered, newline-oriented reader for a single connection.
//!
//! TCP hands us bytes in whatever pieces it likes. [`LineReader`] stitches those
//! pieces back into `\n`-terminated lines and keeps whatever trails the last
//! delivered line (the *leftover*) for the next call.
//!
//! A reader owns its [`ReaderState`] outright, so leftover bytes from one stream
//! can never be handed to another: one connection, one reader.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ReadError;

/// Default read chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Default number of consecutive failed reads tolerated before giving up.
pub const DEFAULT_READ_ATTEMPTS: u32 = 3;

/// Per-connection mutable state.
#[derive(Debug, Default)]
pub struct ReaderState {
    /// Bytes read from the stream but not yet handed out.
    pub leftover: BytesMut,
    /// Set once the stream has reported end-of-input.
    pub closed: bool,
}

pub struct LineReader<R> {
    stream: R,
    state: ReaderState,
    chunk: Vec<u8>,
    read_attempts: u32,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(stream: R) -> Self {
        Self::with_limits(stream, DEFAULT_CHUNK_SIZE, DEFAULT_READ_ATTEMPTS)
    }

    /// Creates a reader with an explicit chunk size and retry budget.
    ///
    /// Both values are clamped to at least 1.
    pub fn with_limits(stream: R, chunk_size: usize, read_attempts: u32) -> Self {
        Self {
            stream,
            state: ReaderState::default(),
            chunk: vec![0u8; chunk_size.max(1)],
            read_attempts: read_attempts.max(1),
        }
    }

    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    /// Returns the next line without its `\n` delimiter.
    ///
    /// `Ok(None)` means the stream is exhausted. A final run of bytes that ends
    /// with end-of-input instead of a newline (a *pseudo-line*) is returned once
    /// as a line; the call after that yields `Ok(None)`.
    pub async fn next_line(&mut self) -> Result<Option<Bytes>, ReadError> {
        // Everything before `scanned` is known to be newline-free.
        let mut scanned = 0;

        loop {
            if let Some(offset) = find_newline(&self.state.leftover[scanned..]) {
                let newline = scanned + offset;
                let mut line = self.state.leftover.split_to(newline + 1);
                line.truncate(newline);
                return Ok(Some(line.freeze()));
            }
            scanned = self.state.leftover.len();

            if self.state.closed {
                if self.state.leftover.is_empty() {
                    return Ok(None);
                }
                tracing::trace!(len = scanned, "delivering unterminated final line");
                return Ok(Some(self.state.leftover.split().freeze()));
            }

            self.fill().await?;
        }
    }

    /// Returns exactly `count` bytes, draining the leftover before touching the
    /// stream.
    pub async fn read_bytes(&mut self, count: usize) -> Result<Bytes, ReadError> {
        while self.state.leftover.len() < count {
            if self.state.closed {
                return Err(ReadError::UnexpectedEof {
                    requested: count,
                    available: self.state.leftover.len(),
                });
            }
            self.fill().await?;
        }

        Ok(self.state.leftover.split_to(count).freeze())
    }

    /// Ends this reader, handing back the stream and any unconsumed bytes.
    pub fn release(self) -> (R, Bytes) {
        (self.stream, self.state.leftover.freeze())
    }

    /// Performs one successful read into the leftover buffer.
    ///
    /// Failed reads are retried until `read_attempts` consecutive failures have
    /// been seen. A zero-length read marks the state closed.
    async fn fill(&mut self) -> Result<(), ReadError> {
        let mut failures = 0;

        loop {
            match self.stream.read(&mut self.chunk).await {
                Ok(0) => {
                    self.state.closed = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.state.leftover.extend_from_slice(&self.chunk[..n]);
                    return Ok(());
                }
                Err(e) => {
                    failures += 1;
                    tracing::debug!(attempt = failures, error = %e, "socket read failed");

                    if failures >= self.read_attempts {
                        return Err(ReadError::RetriesExhausted {
                            attempts: failures,
                            source: e,
                        });
                    }
                }
            }
        }
    }
}

/// Length-bounded newline search; NUL bytes are ordinary data.
fn find_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}
