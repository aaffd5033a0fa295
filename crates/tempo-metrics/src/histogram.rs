//! Histogram implementation for latency and size tracking

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Histogram for tracking value distributions.
///
/// Values above the last boundary land in an overflow bucket.
pub struct Histogram {
    /// Upper bucket boundaries, ascending
    buckets: Vec<f64>,
    /// Counts per bucket plus one overflow slot
    counts: Vec<AtomicU64>,
    /// Sum of all values
    sum: Mutex<f64>,
    /// Total count
    count: AtomicU64,
}

impl Histogram {
    /// Create histogram with default millisecond buckets
    pub fn new() -> Self {
        Self::with_buckets(vec![
            1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0,
        ])
    }

    /// Create histogram with custom buckets
    pub fn with_buckets(mut buckets: Vec<f64>) -> Self {
        buckets.sort_by(f64::total_cmp);
        let counts = (0..=buckets.len()).map(|_| AtomicU64::new(0)).collect();
        Histogram {
            buckets,
            counts,
            sum: Mutex::new(0.0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value
    pub fn observe(&self, value: f64) {
        *self.sum.lock() += value;
        self.count.fetch_add(1, Ordering::Relaxed);

        let slot = self
            .buckets
            .iter()
            .position(|boundary| value <= *boundary)
            .unwrap_or(self.buckets.len());
        self.counts[slot].fetch_add(1, Ordering::Relaxed);
    }

    /// Get mean value
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum() / count as f64
    }

    /// Sum of all observed values
    pub fn sum(&self) -> f64 {
        *self.sum.lock()
    }

    /// Get total count
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// `(upper boundary, count)` pairs; the overflow bucket is reported as infinity
    pub fn bucket_counts(&self) -> Vec<(f64, u64)> {
        self.buckets
            .iter()
            .copied()
            .chain(std::iter::once(f64::INFINITY))
            .zip(self.counts.iter().map(|c| c.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_mean() {
        let h = Histogram::new();
        assert_eq!(h.mean(), 0.0);
        h.observe(2.5);
        h.observe(7.5);
        assert_eq!(h.mean(), 5.0);
        assert_eq!(h.total_count(), 2);
    }

    #[test]
    fn test_histogram_buckets() {
        let h = Histogram::with_buckets(vec![10.0, 1.0]);
        h.observe(0.5);
        h.observe(5.0);
        h.observe(10.0);
        h.observe(99.0);
        assert_eq!(
            h.bucket_counts(),
            vec![(1.0, 1), (10.0, 2), (f64::INFINITY, 1)]
        );
    }
}
