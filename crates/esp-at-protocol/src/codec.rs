//! Line assembly for the AT protocol.
//!
//! The modem answers with ASCII lines terminated by `\r\n`. Bytes arrive in
//! arbitrary chunks, so a [`LineBuffer`] accumulates them and hands out one
//! complete line at a time, leaving any unterminated tail in place for the
//! next read.

use bytes::{Buf, BytesMut};

/// Line terminator used in both directions.
pub const CRLF: &[u8] = b"\r\n";

/// Default cap on an unterminated line before the oldest bytes are dropped.
pub const DEFAULT_MAX_PENDING: usize = 4096;

/// Accumulates received bytes and splits them into CRLF-terminated lines.
///
/// Backed by a [`BytesMut`] cursor: appends extend the tail and extracted
/// lines are split off the front without reallocating the remainder.
#[derive(Debug)]
pub struct LineBuffer {
    /// Bytes received but not yet handed out as a line.
    buffer: BytesMut,
    /// Upper bound for content that has no CRLF in it.
    max_pending: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Create an empty buffer with the default size guard.
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }

    /// Create an empty buffer that keeps at most `max_pending` bytes of an
    /// unterminated line.
    pub fn with_max_pending(max_pending: usize) -> Self {
        LineBuffer {
            buffer: BytesMut::with_capacity(max_pending.min(DEFAULT_MAX_PENDING)),
            max_pending: max_pending.max(CRLF.len()),
        }
    }

    /// Append received bytes.
    ///
    /// Returns the number of bytes dropped by the size guard. Bytes are only
    /// dropped when the buffer holds no complete line and has grown past the
    /// limit; the newest `max_pending` bytes are kept.
    pub fn append(&mut self, chunk: &[u8]) -> usize {
        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() <= self.max_pending || self.has_line() {
            return 0;
        }

        let excess = self.buffer.len() - self.max_pending;
        self.buffer.advance(excess);
        log::warn!(
            "line buffer exceeded {} bytes without a line break, dropped {} bytes",
            self.max_pending,
            excess
        );
        excess
    }

    /// Whether a complete CRLF-terminated line is buffered.
    pub fn has_line(&self) -> bool {
        self.find_crlf().is_some()
    }

    /// Remove and return the next complete line, without its CRLF.
    ///
    /// Returns `None`, leaving the buffer untouched, if no line is complete.
    pub fn take_line(&mut self) -> Option<String> {
        let end = self.find_crlf()?;
        let line = self.buffer.split_to(end);
        self.buffer.advance(CRLF.len());
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whether the buffered content, terminated or not, contains `target`.
    pub fn pending_contains(&self, target: &str) -> bool {
        String::from_utf8_lossy(&self.buffer).contains(target)
    }

    /// Remove and return everything buffered, as text.
    pub fn take_pending(&mut self) -> String {
        let pending = self.buffer.split();
        String::from_utf8_lossy(&pending).into_owned()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get the current buffer contents as a string (for debugging).
    pub fn as_str_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    fn find_crlf(&self) -> Option<usize> {
        self.buffer.windows(CRLF.len()).position(|window| window == CRLF)
    }
}

/// Frame a command line for transmission by appending CRLF.
pub fn encode_command(cmd: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(cmd.len() + CRLF.len());
    buf.extend_from_slice(cmd.as_bytes());
    buf.extend_from_slice(CRLF);
    buf
}
