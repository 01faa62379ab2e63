//! In-memory collaborators for exercising a session without hardware.
//!
//! [`ManualClock`] only moves when slept on or advanced explicitly, and
//! [`ScriptedTransport`] plays back modem output either immediately, at a
//! fixed time, or in reaction to a written command. Both share one time base,
//! so scripted replies become readable exactly when the session's polling
//! loop has slept long enough.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::codec::CRLF;
use crate::error::TransportError;
use crate::transport::{Clock, Transport};

/// A clock that advances only when told to.
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// A clock starting at 0 ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock starting at `now_ms`.
    pub fn starting_at(now_ms: u64) -> Self {
        ManualClock {
            now: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    /// Move time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

/// A frame written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFrame {
    /// Clock time of the write.
    pub at_ms: u64,
    /// Raw bytes, including any CRLF.
    pub data: Vec<u8>,
}

impl WrittenFrame {
    /// The frame as text with a trailing CRLF removed.
    pub fn line(&self) -> String {
        let data = self.data.strip_suffix(CRLF).unwrap_or(&self.data);
        String::from_utf8_lossy(data).into_owned()
    }
}

#[derive(Debug)]
struct Reply {
    command: String,
    delay_ms: u64,
    data: Vec<u8>,
}

/// A transport that plays back scripted modem output.
#[derive(Debug)]
pub struct ScriptedTransport {
    clock: ManualClock,
    /// Output becoming readable at a given time, in insertion order.
    scheduled: Vec<(u64, Vec<u8>)>,
    /// Replies waiting for their command to be written.
    replies: VecDeque<Reply>,
    writes: Vec<WrittenFrame>,
    /// Number of writes accepted before every later one fails.
    write_limit: Option<usize>,
    fail_reads: bool,
    read_attempts: u64,
}

impl ScriptedTransport {
    pub fn new(clock: ManualClock) -> Self {
        ScriptedTransport {
            clock,
            scheduled: Vec::new(),
            replies: VecDeque::new(),
            writes: Vec::new(),
            write_limit: None,
            fail_reads: false,
            read_attempts: 0,
        }
    }

    /// Make `data` readable right away.
    pub fn inject(&mut self, data: &[u8]) {
        let now = self.clock.now_ms();
        self.inject_at(now, data);
    }

    /// Make `data` readable once the clock reaches `at_ms`.
    pub fn inject_at(&mut self, at_ms: u64, data: &[u8]) {
        self.scheduled.push((at_ms, data.to_vec()));
    }

    /// When `command` is written, make `data` readable immediately.
    pub fn reply_to(&mut self, command: &str, data: &[u8]) {
        self.reply_after(command, 0, data);
    }

    /// When `command` is written, make `data` readable `delay_ms` later.
    ///
    /// Each reply fires once; register it again to answer a repeated command.
    pub fn reply_after(&mut self, command: &str, delay_ms: u64, data: &[u8]) {
        self.replies.push_back(Reply {
            command: command.to_string(),
            delay_ms,
            data: data.to_vec(),
        });
    }

    /// Make every later write fail.
    pub fn fail_writes(&mut self) {
        self.write_limit = Some(self.writes.len());
    }

    /// Accept `count` writes in total, then fail every later one.
    pub fn fail_writes_after(&mut self, count: usize) {
        self.write_limit = Some(count);
    }

    /// Report the link as closed on every later read.
    pub fn fail_reads(&mut self) {
        self.fail_reads = true;
    }

    /// Number of `read_available` calls so far.
    pub fn read_attempts(&self) -> u64 {
        self.read_attempts
    }

    /// Every frame written so far.
    pub fn writes(&self) -> &[WrittenFrame] {
        &self.writes
    }

    /// Written frames as text lines.
    pub fn written_lines(&self) -> Vec<String> {
        self.writes.iter().map(WrittenFrame::line).collect()
    }

    /// Whether scripted output is still waiting to be read or triggered.
    pub fn has_pending_output(&self) -> bool {
        !self.scheduled.is_empty() || !self.replies.is_empty()
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.write_limit.is_some_and(|limit| self.writes.len() >= limit) {
            return Err(TransportError::Closed);
        }

        let now = self.clock.now_ms();
        let frame = WrittenFrame {
            at_ms: now,
            data: data.to_vec(),
        };
        let line = frame.line();
        self.writes.push(frame);

        if let Some(index) = self.replies.iter().position(|reply| reply.command == line) {
            if let Some(reply) = self.replies.remove(index) {
                self.scheduled.push((now + reply.delay_ms, reply.data));
            }
        }

        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        self.read_attempts += 1;
        if self.fail_reads {
            return Err(TransportError::Closed);
        }

        let now = self.clock.now_ms();
        let mut ready = Vec::new();
        self.scheduled.retain(|(at_ms, data)| {
            if *at_ms <= now {
                ready.extend_from_slice(data);
                false
            } else {
                true
            }
        });
        Ok(ready)
    }
}
