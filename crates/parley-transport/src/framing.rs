//! Newline framing over any async byte stream.
//!
//! Works with TCP halves in production and `tokio::io::duplex` pipes in
//! tests.

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};

use crate::TransportError;

/// Longest inbound line accepted, excluding the terminator.
pub const MAX_LINE_BYTES: usize = 4096;

const LINE_ENDINGS: &[u8] = b"\r\n";

/// Reads newline-terminated UTF-8 lines from a byte stream.
///
/// A partly received line stays buffered between calls, so
/// [`next_line`](Self::next_line) is cancel-safe and can sit in a
/// `select!` next to other input.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    max_line: usize,
    /// Set after an over-long line was reported, until its `\n` arrives.
    skipping: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wraps a byte stream with the default line limit.
    pub fn new(inner: R) -> Self {
        Self::with_max_line(inner, MAX_LINE_BYTES)
    }

    /// Wraps a byte stream with a custom line limit.
    pub fn with_max_line(inner: R, max_line: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::new(),
            max_line,
            skipping: false,
        }
    }

    /// Reads the next line with its terminator stripped.
    ///
    /// Returns `Ok(None)` on a clean end of stream. A final line without
    /// a trailing newline is still returned. Over-long and non-UTF-8 lines
    /// are consumed and reported as transient errors
    /// (see [`TransportError::is_transient`]).
    pub async fn next_line(
        &mut self,
    ) -> Result<Option<String>, TransportError> {
        loop {
            let available = self
                .inner
                .fill_buf()
                .await
                .map_err(TransportError::ReceiveFailed)?;

            if available.is_empty() {
                self.skipping = false;
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return self.take_line().map(Some);
            }

            let newline = available.iter().position(|b| *b == b'\n');
            let (used, found) = match newline {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };
            if !self.skipping {
                self.buf.extend_from_slice(&available[..used]);
            }
            self.inner.consume(used);

            if self.skipping {
                self.skipping = !found;
            } else if found {
                return self.take_line().map(Some);
            } else if self.buf.len() > self.max_line + 1 {
                // Report now and drop the rest of the line as it arrives.
                self.buf.clear();
                self.skipping = true;
                return Err(TransportError::LineTooLong {
                    max: self.max_line,
                });
            }
        }
    }

    /// Empties the buffer and decodes it as one line.
    fn take_line(&mut self) -> Result<String, TransportError> {
        let raw = std::mem::take(&mut self.buf);
        let line = trim_line_ending(&raw);
        if line.len() > self.max_line {
            return Err(TransportError::LineTooLong {
                max: self.max_line,
            });
        }
        Ok(std::str::from_utf8(line)?.to_owned())
    }
}

/// Writes lines to a byte stream, appending the `\n` terminator.
pub struct LineWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    /// Wraps a byte stream.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes one line and flushes so the peer sees it promptly.
    ///
    /// `line` may itself contain `\n` (multi-line listings); only one
    /// terminator is appended.
    pub async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut encoded = Vec::with_capacity(line.len() + 1);
        encoded.extend_from_slice(line.as_bytes());
        encoded.push(b'\n');
        self.inner
            .write_all(&encoded)
            .await
            .map_err(TransportError::SendFailed)?;
        self.inner.flush().await.map_err(TransportError::SendFailed)
    }

    /// Shuts down the write direction of the stream.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await.map_err(TransportError::SendFailed)
    }
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let mut end = buf.len();
    while end > 0 && LINE_ENDINGS.contains(&buf[end - 1]) {
        end -= 1;
    }
    &buf[..end]
}
