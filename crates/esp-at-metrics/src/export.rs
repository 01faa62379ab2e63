//! In-memory metrics recorder.
//!
//! Keeps every counter and histogram series in process so a run can print a
//! summary at exit, and so tests can install it with
//! [`metrics::with_local_recorder`] and read back what was recorded.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use metrics::{
    Counter, CounterFn, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};

/// One metric name plus its sorted label set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SeriesKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl SeriesKey {
    fn from_key(key: &Key) -> Self {
        let mut labels: Vec<(String, String)> = key
            .labels()
            .map(|label| (label.key().to_string(), label.value().to_string()))
            .collect();
        labels.sort();
        SeriesKey {
            name: key.name().to_string(),
            labels,
        }
    }

    /// Same name, and every `filter` pair present among the labels.
    fn matches(&self, name: &str, filter: &[(&str, &str)]) -> bool {
        self.name == name
            && filter.iter().all(|(key, value)| {
                self.labels
                    .iter()
                    .any(|(label, label_value)| label == key && label_value == value)
            })
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.labels.is_empty() {
            let labels: Vec<String> = self
                .labels
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            write!(f, "{{{}}}", labels.join(","))?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CounterCell(AtomicU64);

impl CounterFn for CounterCell {
    fn increment(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    fn absolute(&self, value: u64) {
        self.0.fetch_max(value, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct HistogramCell(Mutex<Vec<f64>>);

impl HistogramCell {
    fn samples(&self) -> Vec<f64> {
        lock(&self.0).clone()
    }
}

impl HistogramFn for HistogramCell {
    fn record(&self, value: f64) {
        lock(&self.0).push(value);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records counters and histograms in memory. Gauges are ignored.
///
/// ```rust
/// use esp_at_metrics::export::InMemoryRecorder;
///
/// let recorder = InMemoryRecorder::new();
/// metrics::with_local_recorder(&recorder, || {
///     metrics::counter!("esp_at.bytes_written", "device" => "esp32").increment(4);
/// });
/// assert_eq!(recorder.counter("esp_at.bytes_written", &[("device", "esp32")]), 4);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    counters: Mutex<BTreeMap<SeriesKey, Arc<CounterCell>>>,
    histograms: Mutex<BTreeMap<SeriesKey, Arc<HistogramCell>>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of every `name` counter series carrying all `filter` labels.
    pub fn counter(&self, name: &str, filter: &[(&str, &str)]) -> u64 {
        lock(&self.counters)
            .iter()
            .filter(|(key, _)| key.matches(name, filter))
            .map(|(_, cell)| cell.0.load(Ordering::Relaxed))
            .sum()
    }

    /// Samples of every `name` histogram series carrying all `filter` labels.
    pub fn histogram(&self, name: &str, filter: &[(&str, &str)]) -> Vec<f64> {
        lock(&self.histograms)
            .iter()
            .filter(|(key, _)| key.matches(name, filter))
            .flat_map(|(_, cell)| cell.samples())
            .collect()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        lock(&self.counters).is_empty() && lock(&self.histograms).is_empty()
    }

    /// One line per series, sorted by name and labels.
    ///
    /// Counters print their value. Histograms print count, min, mean and max.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, cell) in lock(&self.counters).iter() {
            let _ = writeln!(out, "{} {}", key, cell.0.load(Ordering::Relaxed));
        }
        for (key, cell) in lock(&self.histograms).iter() {
            let samples = cell.samples();
            if samples.is_empty() {
                continue;
            }
            let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
            let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            let _ = writeln!(
                out,
                "{} count={} min={} mean={:.1} max={}",
                key,
                samples.len(),
                min,
                mean,
                max
            );
        }
        out
    }
}

impl Recorder for InMemoryRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        let cell = lock(&self.counters)
            .entry(SeriesKey::from_key(key))
            .or_default()
            .clone();
        Counter::from_arc(cell)
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        let cell = lock(&self.histograms)
            .entry(SeriesKey::from_key(key))
            .or_default()
            .clone();
        Histogram::from_arc(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_sums_matching_series() {
        let recorder = InMemoryRecorder::new();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("esp_at.transactions", "kind" => "execute", "outcome" => "matched")
                .increment(2);
            metrics::counter!("esp_at.transactions", "kind" => "query", "outcome" => "matched")
                .increment(1);
            metrics::counter!("esp_at.transactions", "kind" => "execute", "outcome" => "timeout")
                .increment(1);
        });

        assert_eq!(recorder.counter("esp_at.transactions", &[]), 4);
        assert_eq!(recorder.counter("esp_at.transactions", &[("outcome", "matched")]), 3);
        assert_eq!(
            recorder.counter("esp_at.transactions", &[("kind", "execute"), ("outcome", "timeout")]),
            1
        );
        assert_eq!(recorder.counter("esp_at.bytes_read", &[]), 0);
    }

    #[test]
    fn test_render_lists_series() {
        let recorder = InMemoryRecorder::new();
        assert!(recorder.is_empty());

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("esp_at.bytes_written", "device" => "esp32").increment(6);
            metrics::histogram!("esp_at.transaction_duration_ms", "kind" => "execute").record(4.0);
            metrics::histogram!("esp_at.transaction_duration_ms", "kind" => "execute").record(8.0);
            metrics::gauge!("esp_at.ignored").set(1.0);
        });

        assert_eq!(
            recorder.histogram("esp_at.transaction_duration_ms", &[("kind", "execute")]),
            vec![4.0, 8.0]
        );
        assert_eq!(
            recorder.render(),
            "esp_at.bytes_written{device=esp32} 6\n\
             esp_at.transaction_duration_ms{kind=execute} count=2 min=4 mean=6.0 max=8\n"
        );
    }
}
