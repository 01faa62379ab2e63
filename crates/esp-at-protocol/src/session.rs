//! The transaction engine.
//!
//! An [`AtSession`] owns the transport, the clock and the line buffer, and
//! runs one command/response transaction at a time. Two shapes are offered:
//!
//! - [`execute`](AtSession::execute): flush, send a command, optionally wait
//!   for a line containing an expected substring. Returns `bool`.
//! - [`query`](AtSession::query): keep reading the current stream (no flush,
//!   no send) until a line containing the expected substring arrives. Returns
//!   the line, or an empty string.
//!
//! Multi-line responses are read by one `execute` without an expectation
//! followed by consecutive `query` calls, each consuming the stream up to and
//! including its matching line.

use std::time::Duration;

use esp_at_metrics::{metric_defs, metrics, MetricLabels};

use crate::codec::{encode_command, LineBuffer, DEFAULT_MAX_PENDING};
use crate::commands::AtCommand;
use crate::error::{AtError, AtResult, TransportError};
use crate::matcher::{MatchState, ResponseMatcher};
use crate::transport::{Clock, Transport};

/// Default timeout for [`AtSession::execute`].
pub const DEFAULT_EXECUTE_TIMEOUT_MS: u64 = 100;

/// Default timeout for [`AtSession::query`].
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 200;

/// Success marker.
pub const OK: &str = "OK";

/// Failure marker.
pub const ERROR: &str = "ERROR";

/// Banner printed by the module after a reset.
pub const READY: &str = "ready";

/// How long a factory reset may take before the banner appears.
pub const RESTORE_TIMEOUT_MS: u64 = 5_000;

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Pause before every `execute`, letting trailing bytes of the previous
    /// transaction arrive so they are flushed rather than misread.
    pub quiescence_ms: u64,
    /// Sleep between polls of the transport while waiting.
    pub poll_interval_ms: u64,
    /// Maximum length of an unterminated line kept in the buffer.
    pub max_pending: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            quiescence_ms: 10,
            poll_interval_ms: 1,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

/// One send-and-optionally-await cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Command line, without CRLF.
    pub command: String,
    /// Substring to wait for. `None` sends without waiting.
    pub expected: Option<String>,
    /// How long to wait for `expected`.
    pub timeout_ms: u64,
}

impl TransactionRequest {
    /// A fire-and-forget request with the default timeout.
    pub fn new(command: impl Into<String>) -> Self {
        TransactionRequest {
            command: command.into(),
            expected: None,
            timeout_ms: DEFAULT_EXECUTE_TIMEOUT_MS,
        }
    }

    /// Wait for a line containing `expected`.
    pub fn expect(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Override the timeout.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Substring that fails the wait early.
    ///
    /// Only a wait for `OK` is cut short, by an `ERROR` line.
    pub fn disqualifier(&self) -> Option<&'static str> {
        match self.expected.as_deref() {
            Some(OK) => Some(ERROR),
            _ => None,
        }
    }
}

impl From<&AtCommand> for TransactionRequest {
    fn from(command: &AtCommand) -> Self {
        TransactionRequest::new(command.encode())
    }
}

/// Driver state for one modem.
pub struct AtSession<T, C> {
    transport: T,
    clock: C,
    config: SessionConfig,
    buffer: LineBuffer,
    initialized: bool,
    labels: MetricLabels,
}

impl<T: Transport, C: Clock> AtSession<T, C> {
    /// Create a session with the default configuration.
    pub fn new(transport: T, clock: C) -> Self {
        Self::with_config(transport, clock, SessionConfig::default())
    }

    /// Create a session with an explicit configuration.
    pub fn with_config(transport: T, clock: C, config: SessionConfig) -> Self {
        AtSession {
            transport,
            clock,
            buffer: LineBuffer::with_max_pending(config.max_pending),
            config,
            initialized: false,
            labels: MetricLabels::default(),
        }
    }

    /// Label recorded metrics with `device` instead of the default.
    pub fn with_device_label(mut self, device: impl Into<String>) -> Self {
        self.labels = MetricLabels::new(device);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the last [`initialize`](Self::initialize) succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Bytes received but not yet consumed.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Take the transport and clock back.
    pub fn into_parts(self) -> (T, C) {
        (self.transport, self.clock)
    }

    /// Cooperative pause through the session clock.
    pub fn pause(&self, duration: Duration) {
        self.clock.sleep_ms(duration.as_millis() as u64);
    }

    /// Factory-reset the module and turn off command echo.
    ///
    /// The session counts as initialized only if the module printed its
    /// `ready` banner within 5 s and then acknowledged `ATE0`.
    pub fn initialize(&mut self) -> bool {
        self.initialized = false;

        if !self.execute(&AtCommand::Restore.encode(), Some(READY), RESTORE_TIMEOUT_MS) {
            log::warn!("module did not report ready after restore");
            return false;
        }

        if !self.execute(&AtCommand::EchoOff.encode(), Some(OK), DEFAULT_EXECUTE_TIMEOUT_MS) {
            log::warn!("module did not acknowledge echo off");
            return false;
        }

        log::info!("module initialized");
        self.initialized = true;
        true
    }

    /// Send `command` and optionally wait for a line containing `expected`.
    ///
    /// Returns `true` when no expectation is given, or when a matching line
    /// arrived within `timeout_ms`. Waiting for `OK` fails as soon as an
    /// `ERROR` line arrives.
    pub fn execute(&mut self, command: &str, expected: Option<&str>, timeout_ms: u64) -> bool {
        let request = TransactionRequest {
            command: command.to_string(),
            expected: expected.map(str::to_string),
            timeout_ms,
        };

        match self.transact(&request) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("{:?} failed: {}", command, e);
                false
            }
        }
    }

    /// Send `command` without waiting for anything.
    pub fn send(&mut self, command: &str) -> bool {
        self.execute(command, None, DEFAULT_EXECUTE_TIMEOUT_MS)
    }

    /// Wait for the next line containing `expected` on the current stream.
    ///
    /// Nothing is flushed or sent. Returns the matched line, or an empty
    /// string if nothing matched before the deadline.
    pub fn query(&mut self, expected: &str, timeout_ms: u64) -> String {
        match self.await_line(expected, timeout_ms) {
            Ok(line) => line,
            Err(e) => {
                log::debug!("query failed: {}", e);
                String::new()
            }
        }
    }

    /// Typed form of [`execute`](Self::execute).
    ///
    /// Returns the matched line, or `None` for a fire-and-forget request.
    pub fn transact(&mut self, request: &TransactionRequest) -> AtResult<Option<String>> {
        self.clock.sleep_ms(self.config.quiescence_ms);
        self.flush();

        if let Err(e) = self.write_line(&request.command) {
            self.record("execute", "transport_error", None);
            return Err(e);
        }

        let Some(expected) = request.expected.as_deref() else {
            self.record("execute", "sent", None);
            return Ok(None);
        };

        let mut matcher =
            ResponseMatcher::new(expected, request.timeout_ms, self.clock.now_ms());
        if let Some(disqualifier) = request.disqualifier() {
            matcher = matcher.with_disqualifier(disqualifier);
        }

        let matcher = self.run(matcher, "execute");
        matcher.into_result().map(Some)
    }

    /// Typed form of [`query`](Self::query).
    pub fn await_line(&mut self, expected: &str, timeout_ms: u64) -> AtResult<String> {
        let matcher = ResponseMatcher::new(expected, timeout_ms, self.clock.now_ms());
        let matcher = self.run(matcher, "query");

        match matcher.into_result() {
            Ok(line) => Ok(line),
            Err(AtError::Timeout { target, .. }) => Err(AtError::NoMatch { target }),
            Err(e) => Err(e),
        }
    }

    /// Drive `matcher` to a terminal state.
    ///
    /// A closed transport ends the wait at once. Other read errors are
    /// retried on the next poll and logged once per wait.
    fn run(&mut self, mut matcher: ResponseMatcher, kind: &'static str) -> ResponseMatcher {
        let mut read_failed = false;
        loop {
            let now = self.clock.now_ms();
            if matcher.check_deadline(now, &mut self.buffer).is_terminal() {
                break;
            }

            match self.fill() {
                Ok(()) => {}
                Err(TransportError::Closed) => {
                    log::warn!("transport closed while waiting for {:?}", matcher.target());
                    matcher.close();
                    break;
                }
                Err(e) => {
                    if !read_failed {
                        log::warn!("transport read failed: {}", e);
                        read_failed = true;
                    }
                }
            }

            if matcher.drain(&mut self.buffer).is_terminal() {
                break;
            }

            self.clock.sleep_ms(self.config.poll_interval_ms);
        }

        let outcome = match matcher.state() {
            MatchState::Matched(_) if matcher.was_recovered() => "recovered",
            MatchState::Matched(_) => "matched",
            MatchState::Disqualified(_) => "disqualified",
            MatchState::Closed => "transport_error",
            MatchState::TimedOut | MatchState::Waiting => "timeout",
        };
        let elapsed = matcher.elapsed_ms(self.clock.now_ms());
        log::debug!(
            "{} wait for {:?} ended {} after {} ms",
            kind,
            matcher.target(),
            outcome,
            elapsed
        );
        self.record(kind, outcome, Some(elapsed));
        if matcher.discarded_lines() > 0 {
            metrics::counter!(metric_defs::LINES_DISCARDED.name, &self.labels.to_labels())
                .increment(matcher.discarded_lines());
        }

        matcher
    }

    /// Pull whatever the transport has into the line buffer.
    fn fill(&mut self) -> Result<(), TransportError> {
        let data = self.transport.read_available()?;
        if data.is_empty() {
            return Ok(());
        }

        metrics::counter!(metric_defs::BYTES_READ.name, &self.labels.to_labels())
            .increment(data.len() as u64);
        let dropped = self.buffer.append(&data);
        if dropped > 0 {
            metrics::counter!(metric_defs::BUFFER_OVERFLOW.name, &self.labels.to_labels())
                .increment(dropped as u64);
        }
        Ok(())
    }

    /// Discard anything left over from previous transactions.
    fn flush(&mut self) {
        match self.transport.read_available() {
            Ok(stale) if !stale.is_empty() => {
                log::trace!("flushed {} stale bytes", stale.len());
                metrics::counter!(metric_defs::BYTES_READ.name, &self.labels.to_labels())
                    .increment(stale.len() as u64);
            }
            Ok(_) => {}
            Err(e) => log::warn!("transport read failed while flushing: {}", e),
        }
        self.buffer.clear();
    }

    fn write_line(&mut self, command: &str) -> AtResult<()> {
        log::trace!("-> {:?}", command);
        let frame = encode_command(command);
        self.transport.write(&frame)?;
        metrics::counter!(metric_defs::BYTES_WRITTEN.name, &self.labels.to_labels())
            .increment(frame.len() as u64);
        Ok(())
    }

    fn record(&self, kind: &'static str, outcome: &'static str, elapsed_ms: Option<u64>) {
        let labels = self
            .labels
            .with(&[("kind", kind.to_string()), ("outcome", outcome.to_string())]);
        metrics::counter!(metric_defs::TRANSACTIONS.name, &labels).increment(1);

        if let Some(elapsed_ms) = elapsed_ms {
            let labels = self.labels.with(&[("kind", kind.to_string())]);
            metrics::histogram!(metric_defs::TRANSACTION_DURATION.name, &labels)
                .record(elapsed_ms as f64);
        }
    }
}
