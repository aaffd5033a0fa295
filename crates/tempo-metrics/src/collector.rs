//! Named metric storage

use crate::{Histogram, HistogramSummary, MetricsSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe metrics storage
pub struct Metrics {
    /// Histogram metrics for latency tracking
    histograms: RwLock<HashMap<String, Arc<Histogram>>>,
    /// Counter metrics for event counting
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
    /// Gauge metrics for current values
    gauges: RwLock<HashMap<String, Arc<AtomicI64>>>,
}

impl Metrics {
    /// Create a new metrics store
    pub fn new() -> Self {
        Self {
            histograms: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
        }
    }

    /// Record a histogram observation
    pub fn histogram(&self, name: &str, value: f64) {
        if let Some(h) = self.histograms.read().get(name) {
            h.observe(value);
            return;
        }

        let mut histograms = self.histograms.write();
        let h = histograms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::new()));
        h.observe(value);
    }

    /// Increment a counter
    pub fn counter(&self, name: &str, delta: u64) {
        self.counter_handle(name).fetch_add(delta, Ordering::Relaxed);
    }

    /// Read a counter and reset it to zero
    pub fn take_counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map(|c| c.swap(0, Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn counter_handle(&self, name: &str) -> Arc<AtomicU64> {
        if let Some(c) = self.counters.read().get(name) {
            return Arc::clone(c);
        }
        let mut counters = self.counters.write();
        Arc::clone(
            counters
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AtomicU64::new(0))),
        )
    }

    /// Set a gauge value
    pub fn gauge(&self, name: &str, value: i64) {
        if let Some(g) = self.gauges.read().get(name) {
            g.store(value, Ordering::Relaxed);
            return;
        }

        let mut gauges = self.gauges.write();
        let g = gauges
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicI64::new(0)));
        g.store(value, Ordering::Relaxed);
    }

    /// Mean of a histogram, if anything was recorded under `name`
    pub fn histogram_mean(&self, name: &str) -> Option<f64> {
        self.histograms.read().get(name).map(|h| h.mean())
    }

    /// Current counter value
    pub fn get_counter(&self, name: &str) -> Option<u64> {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
    }

    /// Copy every metric into a serializable snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self
                .counters
                .read()
                .iter()
                .map(|(name, c)| (name.clone(), c.load(Ordering::Relaxed)))
                .collect(),
            gauges: self
                .gauges
                .read()
                .iter()
                .map(|(name, g)| (name.clone(), g.load(Ordering::Relaxed)))
                .collect(),
            histograms: self
                .histograms
                .read()
                .iter()
                .map(|(name, h)| {
                    let summary = HistogramSummary {
                        mean: h.mean(),
                        count: h.total_count(),
                    };
                    (name.clone(), summary)
                })
                .collect(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
