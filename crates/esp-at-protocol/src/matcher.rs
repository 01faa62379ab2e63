//! Timeout-bounded response matching.
//!
//! A [`ResponseMatcher`] waits for a line containing a target substring. It
//! does no I/O and never reads the clock itself: the driver feeds it the
//! current time and a [`LineBuffer`] on every polling iteration, so it can be
//! stepped with synthetic time and bytes.
//!
//! One polling iteration is:
//!
//! 1. [`check_deadline`](ResponseMatcher::check_deadline) with the current time
//! 2. append freshly read transport bytes to the buffer
//! 3. [`drain`](ResponseMatcher::drain) every complete line
//!
//! ```text
//!            line contains target
//!  Waiting ───────────────────────────► Matched(line)
//!     │  line contains disqualifier
//!     ├────────────────────────────────► Disqualified(line)
//!     │  deadline passed, raw buffer contains target
//!     ├────────────────────────────────► Matched(raw buffer)
//!     │  deadline passed
//!     ├────────────────────────────────► TimedOut
//!     │  transport closed
//!     └────────────────────────────────► Closed
//! ```

use crate::codec::LineBuffer;
use crate::error::{AtError, TransportError};

/// State of a single wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchState {
    /// Still waiting for a line.
    Waiting,
    /// A line containing the target arrived.
    Matched(String),
    /// The deadline elapsed without a match.
    TimedOut,
    /// A line containing the disqualifier arrived first.
    Disqualified(String),
    /// The transport closed; nothing more can arrive.
    Closed,
}

impl MatchState {
    /// Whether the wait is over.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchState::Waiting)
    }

    /// Whether the wait ended in a match.
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchState::Matched(_))
    }
}

/// Waits for a line containing `target`, bounded by a deadline.
#[derive(Debug, Clone)]
pub struct ResponseMatcher {
    target: String,
    disqualifier: Option<String>,
    timeout_ms: u64,
    started_at_ms: u64,
    state: MatchState,
    /// Set when the match came from the unterminated buffer at the deadline.
    recovered: bool,
    /// Lines seen and thrown away before reaching a terminal state.
    discarded: u64,
}

impl ResponseMatcher {
    /// Start waiting for `target` at time `started_at_ms`.
    pub fn new(target: impl Into<String>, timeout_ms: u64, started_at_ms: u64) -> Self {
        ResponseMatcher {
            target: target.into(),
            disqualifier: None,
            timeout_ms,
            started_at_ms,
            state: MatchState::Waiting,
            recovered: false,
            discarded: 0,
        }
    }

    /// End the wait early with failure when a line contains `disqualifier`.
    pub fn with_disqualifier(mut self, disqualifier: impl Into<String>) -> Self {
        self.disqualifier = Some(disqualifier.into());
        self
    }

    /// The awaited substring.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The configured disqualifier, if any.
    pub fn disqualifier(&self) -> Option<&str> {
        self.disqualifier.as_deref()
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    /// Current state.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Whether the match was recovered from an unterminated buffer.
    pub fn was_recovered(&self) -> bool {
        self.recovered
    }

    /// Number of lines discarded so far.
    pub fn discarded_lines(&self) -> u64 {
        self.discarded
    }

    /// Milliseconds since the wait started.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at_ms)
    }

    /// Whether the deadline has passed at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.elapsed_ms(now_ms) > self.timeout_ms
    }

    /// Step 1 of an iteration: move to a terminal state if the deadline passed.
    ///
    /// At the deadline, content still sitting in the buffer without a CRLF is
    /// checked for the target as a last resort; on a hit the whole raw
    /// content becomes the matched text and is consumed from the buffer.
    pub fn check_deadline(&mut self, now_ms: u64, buffer: &mut LineBuffer) -> &MatchState {
        if self.state.is_terminal() || !self.is_expired(now_ms) {
            return &self.state;
        }

        if buffer.pending_contains(&self.target) {
            let raw = buffer.take_pending();
            log::debug!("recovered unterminated response for {:?}: {:?}", self.target, raw);
            self.recovered = true;
            self.state = MatchState::Matched(raw);
        } else {
            log::debug!(
                "timed out after {} ms waiting for {:?}",
                self.elapsed_ms(now_ms),
                self.target
            );
            self.state = MatchState::TimedOut;
        }

        &self.state
    }

    /// Step 3 of an iteration: consume complete lines until one is decisive.
    ///
    /// Lines that neither match nor disqualify are discarded. Lines after a
    /// decisive one stay in the buffer for the next wait.
    pub fn drain(&mut self, buffer: &mut LineBuffer) -> &MatchState {
        while !self.state.is_terminal() {
            let Some(line) = buffer.take_line() else {
                break;
            };
            log::trace!("<- {:?}", line);

            if line.contains(self.target.as_str()) {
                self.state = MatchState::Matched(line);
            } else if self
                .disqualifier
                .as_deref()
                .is_some_and(|disqualifier| line.contains(disqualifier))
            {
                log::debug!("{:?} disqualified wait for {:?}", line, self.target);
                self.state = MatchState::Disqualified(line);
            } else {
                self.discarded += 1;
            }
        }

        &self.state
    }

    /// End the wait because the transport will deliver no more bytes.
    ///
    /// Lines already drained keep their effect: a terminal state is left
    /// unchanged.
    pub fn close(&mut self) -> &MatchState {
        if !self.state.is_terminal() {
            log::debug!("transport closed while waiting for {:?}", self.target);
            self.state = MatchState::Closed;
        }
        &self.state
    }

    /// Convert the final state into a result.
    ///
    /// A matcher that never reached a terminal state is reported as timed out.
    pub fn into_result(self) -> Result<String, AtError> {
        match self.state {
            MatchState::Matched(line) => Ok(line),
            MatchState::Disqualified(line) => Err(AtError::Disqualified { line }),
            MatchState::Closed => Err(AtError::Transport(TransportError::Closed)),
            MatchState::TimedOut | MatchState::Waiting => Err(AtError::Timeout {
                target: self.target,
                timeout_ms: self.timeout_ms,
            }),
        }
    }
}
