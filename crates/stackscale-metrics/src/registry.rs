//! Metrics registry — keeps every series the autoscaler publishes.
//!
//! Series are keyed by name plus a sorted label set. Counters and gauges
//! are stored as `f64` bit patterns in atomics so concurrent updates to an
//! existing series only take the read lock; histograms keep a bounded
//! window of raw samples behind a mutex.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use stackscale_core::metrics::{Labels, MetricsSink};

/// Samples kept per histogram series before the oldest are dropped.
const DEFAULT_SAMPLE_WINDOW: usize = 1024;

/// Name plus labels, labels sorted by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub name: String,
    pub labels: Vec<(String, String)>,
}

impl SeriesKey {
    pub fn new(name: &str, labels: Labels<'_>) -> Self {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        labels.sort();
        Self {
            name: name.to_string(),
            labels,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Point-in-time summary of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Everything the registry holds, sorted by key.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub counters: Vec<(SeriesKey, f64)>,
    pub gauges: Vec<(SeriesKey, f64)>,
    pub histograms: Vec<(SeriesKey, HistogramSummary)>,
}

struct Histogram {
    count: u64,
    sum: f64,
    samples: VecDeque<f64>,
}

/// In-process `MetricsSink` with read-back accessors.
pub struct MetricsRegistry {
    counters: RwLock<HashMap<SeriesKey, Arc<AtomicU64>>>,
    gauges: RwLock<HashMap<SeriesKey, Arc<AtomicU64>>>,
    histograms: RwLock<HashMap<SeriesKey, Arc<Mutex<Histogram>>>>,
    sample_window: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_sample_window(DEFAULT_SAMPLE_WINDOW)
    }

    /// Registry whose histograms keep at most `sample_window` raw samples.
    pub fn with_sample_window(sample_window: usize) -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            sample_window: sample_window.max(1),
        }
    }

    pub fn counter(&self, name: &str, labels: Labels<'_>) -> Option<f64> {
        let key = SeriesKey::new(name, labels);
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        counters.get(&key).map(|c| load_f64(c))
    }

    pub fn gauge(&self, name: &str, labels: Labels<'_>) -> Option<f64> {
        let key = SeriesKey::new(name, labels);
        let gauges = self.gauges.read().unwrap_or_else(|e| e.into_inner());
        gauges.get(&key).map(|g| load_f64(g))
    }

    pub fn histogram(&self, name: &str, labels: Labels<'_>) -> Option<HistogramSummary> {
        let key = SeriesKey::new(name, labels);
        let histograms = self.histograms.read().unwrap_or_else(|e| e.into_inner());
        histograms.get(&key).map(|h| summarize(h))
    }

    /// Sum of a counter across every label set.
    pub fn counter_total(&self, name: &str) -> f64 {
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        counters
            .iter()
            .filter(|(k, _)| k.name == name)
            .map(|(_, c)| load_f64(c))
            .sum()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut counters: Vec<(SeriesKey, f64)> = {
            let map = self.counters.read().unwrap_or_else(|e| e.into_inner());
            map.iter().map(|(k, c)| (k.clone(), load_f64(c))).collect()
        };
        let mut gauges: Vec<(SeriesKey, f64)> = {
            let map = self.gauges.read().unwrap_or_else(|e| e.into_inner());
            map.iter().map(|(k, g)| (k.clone(), load_f64(g))).collect()
        };
        let mut histograms: Vec<(SeriesKey, HistogramSummary)> = {
            let map = self.histograms.read().unwrap_or_else(|e| e.into_inner());
            map.iter().map(|(k, h)| (k.clone(), summarize(h))).collect()
        };
        counters.sort_by(|a, b| a.0.cmp(&b.0));
        gauges.sort_by(|a, b| a.0.cmp(&b.0));
        histograms.sort_by(|a, b| a.0.cmp(&b.0));

        debug!(
            counters = counters.len(),
            gauges = gauges.len(),
            histograms = histograms.len(),
            "metrics snapshot taken"
        );
        MetricsSnapshot {
            counters,
            gauges,
            histograms,
        }
    }

    /// Drop every series.
    pub fn reset(&self) {
        self.counters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.gauges.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.histograms
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn cell(
        map: &RwLock<HashMap<SeriesKey, Arc<AtomicU64>>>,
        name: &str,
        labels: Labels<'_>,
    ) -> Arc<AtomicU64> {
        let key = SeriesKey::new(name, labels);
        if let Some(cell) = map.read().unwrap_or_else(|e| e.into_inner()).get(&key) {
            return Arc::clone(cell);
        }
        let mut map = map.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            map.entry(key)
                .or_insert_with(|| Arc::new(AtomicU64::new(0f64.to_bits()))),
        )
    }
}

impl MetricsSink for MetricsRegistry {
    fn incr_counter(&self, name: &str, labels: Labels<'_>, by: f64) {
        let cell = Self::cell(&self.counters, name, labels);
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + by).to_bits();
            match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    fn set_gauge(&self, name: &str, labels: Labels<'_>, value: f64) {
        Self::cell(&self.gauges, name, labels).store(value.to_bits(), Ordering::Relaxed);
    }

    fn observe(&self, name: &str, labels: Labels<'_>, value: f64) {
        let key = SeriesKey::new(name, labels);
        let existing = self
            .histograms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        let histogram = match existing {
            Some(h) => h,
            None => {
                let mut map = self.histograms.write().unwrap_or_else(|e| e.into_inner());
                Arc::clone(map.entry(key).or_insert_with(|| {
                    Arc::new(Mutex::new(Histogram {
                        count: 0,
                        sum: 0.0,
                        samples: VecDeque::new(),
                    }))
                }))
            }
        };

        let mut h = histogram.lock().unwrap_or_else(|e| e.into_inner());
        h.count += 1;
        h.sum += value;
        if h.samples.len() >= self.sample_window {
            h.samples.pop_front();
        }
        h.samples.push_back(value);
    }
}

fn load_f64(cell: &AtomicU64) -> f64 {
    f64::from_bits(cell.load(Ordering::Relaxed))
}

fn summarize(histogram: &Mutex<Histogram>) -> HistogramSummary {
    let h = histogram.lock().unwrap_or_else(|e| e.into_inner());
    let samples: Vec<f64> = h.samples.iter().copied().collect();
    let [p50, p95, p99] = compute_percentiles(&samples);
    HistogramSummary {
        count: h.count,
        sum: h.sum,
        p50,
        p95,
        p99,
    }
}

/// P50, P95 and P99 over the retained samples; all zero when empty.
fn compute_percentiles(samples: &[f64]) -> [f64; 3] {
    if samples.is_empty() {
        return [0.0; 3];
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    [0.50, 0.95, 0.99].map(|q| {
        let idx = (sorted.len() as f64 * q) as usize;
        sorted[idx.min(sorted.len() - 1)]
    })
}
