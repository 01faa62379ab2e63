//! Metrics infrastructure for the ESP-AT modem driver.
//!
//! This crate describes every metric the driver records and provides label
//! helpers. It re-exports the `metrics` crate so recorders and callers agree on
//! a single version, and declares each metric as a structured [`Metric`]
//! constant to avoid typos in metric names.
//!
//! # Example
//!
//! ```rust,ignore
//! use esp_at_metrics::{MetricLabels, metric_defs, describe_metrics};
//!
//! // Register descriptions once at startup
//! describe_metrics();
//!
//! // Label everything recorded for one modem
//! let labels = MetricLabels::new("192.168.4.1:23");
//!
//! metrics::counter!(metric_defs::BYTES_WRITTEN.name, &labels.to_labels()).increment(12);
//! ```
//!
//! Nothing is kept unless a recorder is installed; [`export::InMemoryRecorder`]
//! collects everything in process.

pub use metrics;

pub mod export;

use metrics::{describe_counter, describe_histogram, Unit};

/// How a metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Histogram,
}

/// Name and metadata of one recorded metric.
///
/// ```rust
/// use esp_at_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const LINES_SEEN: Metric = Metric::counter("esp_at.lines_seen")
///     .with_description("Lines received from the modem")
///     .with_unit(Unit::Count)
///     .with_labels(&["device"]);
///
/// assert_eq!(LINES_SEEN.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys attached when recording.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Metric {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Hand the description to the installed recorder.
    pub fn describe(&self) {
        let unit = self.unit.unwrap_or(Unit::Count);
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, unit, self.description),
            MetricKind::Histogram => describe_histogram!(self.name, unit, self.description),
        }
    }
}

/// All metric definitions for the driver.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every driver metric.
    pub const STANDARD_LABELS: &[&str] = &["device"];

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Completed transactions.
    ///
    /// Labels: device, kind (`execute` | `query`), outcome
    /// (`sent` | `matched` | `recovered` | `timeout` | `disqualified` | `transport_error`)
    pub const TRANSACTIONS: Metric = Metric::counter("esp_at.transactions")
        .with_description("Completed command/response transactions")
        .with_unit(Unit::Count)
        .with_labels(&["device", "kind", "outcome"]);

    /// Time from the start of a wait until it reached a terminal state.
    ///
    /// Labels: device, kind
    pub const TRANSACTION_DURATION: Metric = Metric::histogram("esp_at.transaction_duration_ms")
        .with_description("Time spent waiting for a response in milliseconds")
        .with_unit(Unit::Milliseconds)
        .with_labels(&["device", "kind"]);

    // ========================================================================
    // Wire
    // ========================================================================

    pub const BYTES_WRITTEN: Metric = Metric::counter("esp_at.bytes_written")
        .with_description("Bytes written to the modem")
        .with_unit(Unit::Bytes)
        .with_labels(&["device"]);

    pub const BYTES_READ: Metric = Metric::counter("esp_at.bytes_read")
        .with_description("Bytes read from the modem, including flushed bytes")
        .with_unit(Unit::Bytes)
        .with_labels(&["device"]);

    /// Lines that were received but neither matched nor disqualified a wait.
    pub const LINES_DISCARDED: Metric = Metric::counter("esp_at.lines_discarded")
        .with_description("Received lines discarded while waiting for a response")
        .with_unit(Unit::Count)
        .with_labels(&["device"]);

    /// Bytes dropped because an unterminated line outgrew the line buffer.
    pub const BUFFER_OVERFLOW: Metric = Metric::counter("esp_at.buffer_overflow_bytes")
        .with_description("Bytes dropped from an unterminated line that exceeded the buffer limit")
        .with_unit(Unit::Bytes)
        .with_labels(&["device"]);

    pub const ALL: &[&Metric] = &[
        &TRANSACTIONS,
        &TRANSACTION_DURATION,
        &BYTES_WRITTEN,
        &BYTES_READ,
        &LINES_DISCARDED,
        &BUFFER_OVERFLOW,
    ];
}

/// Labels identifying the modem a metric was recorded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLabels {
    pub device: String,
}

impl Default for MetricLabels {
    fn default() -> Self {
        Self::new("esp32")
    }
}

impl MetricLabels {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("device", self.device.clone())]
    }

    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Register descriptions for every driver metric. Call once at startup.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
