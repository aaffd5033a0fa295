//! # tempo-metrics
//!
//! Observability for tempo replicas.
//!
//! Features:
//! - Histogram for latency and size distributions
//! - Counter for event counting
//! - Gauge for current values
//! - `Statistics` facade fed by the replica driver
//! - [`timed!`] for recording how long a block of code takes
//! - JSON export
//!
//! Recording is infallible and never feeds back into protocol decisions.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collector;
mod export;
mod histogram;
mod stats;

pub use collector::Metrics;
pub use export::{HistogramSummary, MetricsSnapshot};
pub use histogram::Histogram;
pub use stats::{names, Statistics, StatsReport};

/// Macro for timing a block of code, recorded in milliseconds
#[macro_export]
macro_rules! timed {
    ($metrics:expr, $name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        $metrics.histogram($name, start.elapsed().as_secs_f64() * 1000.0);
        result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_macro_records_histogram() {
        let metrics = Metrics::new();
        let value = timed!(metrics, "work_ms", { 2 + 2 });
        assert_eq!(value, 4);
        assert_eq!(metrics.snapshot().histograms["work_ms"].count, 1);
    }
}
