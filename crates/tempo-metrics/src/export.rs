//! Metrics export and snapshot functionality

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of all metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Counter values
    pub counters: BTreeMap<String, u64>,
    /// Gauge values
    pub gauges: BTreeMap<String, i64>,
    /// Histogram summaries (mean, count)
    pub histograms: BTreeMap<String, HistogramSummary>,
}

/// Summary of a histogram
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    /// Mean value
    pub mean: f64,
    /// Total observation count
    pub count: u64,
}

impl MetricsSnapshot {
    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export snapshot as compact JSON string
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metrics;

    #[test]
    fn test_snapshot_json() {
        let metrics = Metrics::new();
        metrics.counter("txn.received", 100);
        metrics.gauge("view.current", 5);
        metrics.histogram("txn.latency_ms", 50.0);

        let snapshot = metrics.snapshot();
        let json = snapshot.to_json().unwrap();

        assert!(json.contains("txn.received"));
        assert!(json.contains("100"));
        assert!(json.contains("view.current"));
        assert!(json.contains("txn.latency_ms"));

        let back: MetricsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert!(snapshot.to_json_compact().unwrap().contains("counters"));
    }
}
