//! Observability: latency histograms and outcome counters for the lookup path.
//! Histograms track p50/p95/p99 over the most recent samples.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

/// A span measuring elapsed time from creation to explicit end.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn new(name: &'static str, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            name,
            start: Instant::now(),
            registry,
        }
    }

    /// End the span, recording elapsed duration in microseconds.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Fixed-capacity ring buffer for histogram samples.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        let idx = idx.min(self.count - 1);
        sorted[idx]
    }
}

/// Stores histograms and counters for all named metrics.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
    counters: Mutex<HashMap<&'static str, u64>>,
    ring_capacity: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            ring_capacity: 1024,
        }
    }

    /// Record a sample (in microseconds) for the named metric.
    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut hists = self.histograms.lock();
        hists
            .entry(name)
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us = value_us, "metric_recorded");
    }

    /// Bump a counter by one.
    pub fn incr(&self, name: &'static str) {
        *self.counters.lock().entry(name).or_insert(0) += 1;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Start a timing span that records on finish.
    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan::new(name, Arc::clone(self))
    }

    /// Get percentile for a metric (p value 0-100). Returns microseconds.
    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        let hists = self.histograms.lock();
        hists
            .get(name)
            .map(|ring| ring.percentile(p))
            .unwrap_or(0.0)
    }

    /// Histograms at p50/p95/p99 plus all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let histograms = {
            let hists = self.histograms.lock();
            hists
                .iter()
                .map(|(&name, ring)| {
                    (
                        name.to_string(),
                        MetricSummary {
                            p50_us: ring.percentile(50.0),
                            p95_us: ring.percentile(95.0),
                            p99_us: ring.percentile(99.0),
                            count: ring.count,
                        },
                    )
                })
                .collect()
        };
        let counters = self
            .counters
            .lock()
            .iter()
            .map(|(&name, &v)| (name.to_string(), v))
            .collect();
        MetricsSnapshot {
            histograms,
            counters,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub histograms: HashMap<String, MetricSummary>,
    pub counters: HashMap<String, u64>,
}

/// Well-known metric names (constants to avoid typos).
pub mod metric_names {
    pub const LOOKUP: &str = "t_lookup";
    pub const CACHE_GET: &str = "t_cache_get";
    pub const CACHE_SET: &str = "t_cache_set";
    pub const PROVIDER_CALL: &str = "t_provider_call";

    pub const CACHE_HIT: &str = "cache_hit";
    pub const CACHE_MISS: &str = "cache_miss";
    pub const CACHE_ERROR: &str = "cache_error";
    pub const PROVIDER_CALLS: &str = "provider_call";
    pub const PROVIDER_ERROR: &str = "provider_error";
    pub const INVALID_LANGUAGE: &str = "invalid_language";
    pub const NO_TRANSLATION: &str = "no_translation";
    pub const INFLIGHT_SHARED: &str = "inflight_shared";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_samples() {
        let reg = MetricsRegistry::new();
        for v in 1..=100 {
            reg.record("x", v as f64);
        }
        assert_eq!(reg.percentile("x", 50.0), 51.0);
        assert_eq!(reg.percentile("x", 99.0), 99.0);
        assert_eq!(reg.percentile("unknown", 50.0), 0.0);
    }

    #[test]
    fn ring_keeps_most_recent_samples() {
        let mut ring = SampleRing::new(4);
        for v in [100.0, 1.0, 2.0, 3.0, 4.0] {
            ring.push(v);
        }
        assert_eq!(ring.count, 4);
        assert_eq!(ring.percentile(100.0), 4.0);
    }

    #[test]
    fn counters_and_snapshot() {
        let reg = Arc::new(MetricsRegistry::new());
        reg.incr(metric_names::CACHE_HIT);
        reg.incr(metric_names::CACHE_HIT);
        reg.span(metric_names::LOOKUP).finish();

        assert_eq!(reg.counter(metric_names::CACHE_HIT), 2);
        assert_eq!(reg.counter(metric_names::CACHE_MISS), 0);

        let snap = reg.snapshot();
        assert_eq!(snap.counters["cache_hit"], 2);
        assert_eq!(snap.histograms["t_lookup"].count, 1);
    }
}
