//! Protocol statistics fed by the replica driver

use crate::{Metrics, MetricsSnapshot};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Metric names recorded by [`Statistics`]
pub mod names {
    /// Transactions received from clients
    pub const TXN_RECEIVED: &str = "txn.received";
    /// Transactions committed over the whole run
    pub const TXN_COMMITTED: &str = "txn.committed";
    /// Transactions committed since the last query
    pub const TXN_COMMITTED_WINDOW: &str = "txn.committed_window";
    /// Submission-to-commit latency
    pub const TXN_LATENCY_MS: &str = "txn.latency_ms";
    /// Blocks whose transactions were released
    pub const BLOCK_COMMITTED: &str = "block.committed";
    /// Transactions per proposed block
    pub const BLOCK_SIZE: &str = "block.size";
    /// Time spent drafting a proposal
    pub const BLOCK_CREATE_MS: &str = "block.create_ms";
    /// Time spent processing a proposal
    pub const BLOCK_PROCESS_MS: &str = "block.process_ms";
    /// Time from proposal to vote delivery
    pub const VOTE_MS: &str = "vote.process_ms";
    /// Time between consecutive view entries
    pub const ROUND_MS: &str = "view.round_ms";
    /// Latest view entered
    pub const CURRENT_VIEW: &str = "view.current";
}

/// Averages and throughput at the time of a [`Statistics::query`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    /// Seconds since the start signal
    pub elapsed_secs: f64,
    /// Transactions received
    pub received: u64,
    /// Transactions committed
    pub committed_txns: u64,
    /// Average transactions per proposed block
    pub avg_block_size: f64,
    /// Average proposal drafting time (ms)
    pub avg_create_ms: f64,
    /// Average proposal processing time (ms)
    pub avg_process_ms: f64,
    /// Average vote time (ms)
    pub avg_vote_ms: f64,
    /// Average time per view (ms)
    pub avg_round_ms: f64,
    /// Average submission-to-commit latency (ms)
    pub avg_latency_ms: f64,
    /// Committed transactions per second since the previous query
    pub throughput: f64,
}

struct Clock {
    start: Instant,
    last_query: Instant,
    last_view: Instant,
}

impl Clock {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_query: now,
            last_view: now,
        }
    }
}

/// Passive protocol counters for one replica
pub struct Statistics {
    metrics: Metrics,
    clock: Mutex<Clock>,
}

impl Statistics {
    /// Create statistics backed by a fresh metrics store
    pub fn new() -> Self {
        Self {
            metrics: Metrics::new(),
            clock: Mutex::new(Clock::new()),
        }
    }

    /// Underlying metrics store
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// A client transaction arrived
    pub fn received(&self) {
        self.metrics.counter(names::TXN_RECEIVED, 1);
    }

    /// A transaction committed after `latency`
    pub fn add_latency(&self, latency: Duration) {
        self.metrics.histogram(names::TXN_LATENCY_MS, millis(latency));
    }

    /// A committed block released `count` transactions
    pub fn add_committed_txns(&self, count: usize) {
        self.metrics.counter(names::TXN_COMMITTED, count as u64);
        self.metrics.counter(names::TXN_COMMITTED_WINDOW, count as u64);
        self.metrics.counter(names::BLOCK_COMMITTED, 1);
    }

    /// A proposal of `size` transactions was drafted; its creation time is
    /// recorded under [`names::BLOCK_CREATE_MS`] by the caller
    pub fn proposed_block(&self, size: usize) {
        self.metrics.histogram(names::BLOCK_SIZE, size as f64);
    }

    /// A proposal was processed in `elapsed`
    pub fn processed(&self, elapsed: Duration) {
        self.metrics.histogram(names::BLOCK_PROCESS_MS, millis(elapsed));
    }

    /// A vote was delivered `elapsed` after the proposal arrived
    pub fn voted(&self, elapsed: Duration) {
        self.metrics.histogram(names::VOTE_MS, millis(elapsed));
    }

    /// `view` was entered
    pub fn round_time(&self, view: u64) {
        let now = Instant::now();
        let lasted = {
            let mut clock = self.clock.lock();
            let lasted = now.duration_since(clock.last_view);
            clock.last_view = now;
            lasted
        };
        self.metrics.histogram(names::ROUND_MS, millis(lasted));
        self.metrics.gauge(names::CURRENT_VIEW, view as i64);
    }

    /// The protocol started; resets every clock
    pub fn start_signal(&self) {
        *self.clock.lock() = Clock::new();
    }

    /// Summarize; throughput covers the window since the previous query
    pub fn query(&self) -> StatsReport {
        let now = Instant::now();
        let (elapsed, window) = {
            let mut clock = self.clock.lock();
            let window = now.duration_since(clock.last_query);
            clock.last_query = now;
            (now.duration_since(clock.start), window)
        };

        let committed_in_window = self.metrics.take_counter(names::TXN_COMMITTED_WINDOW);
        let throughput = if window.is_zero() {
            0.0
        } else {
            committed_in_window as f64 / window.as_secs_f64()
        };

        let mean = |name: &str| self.metrics.histogram_mean(name).unwrap_or(0.0);
        let report = StatsReport {
            elapsed_secs: elapsed.as_secs_f64(),
            received: self.metrics.get_counter(names::TXN_RECEIVED).unwrap_or(0),
            committed_txns: self.metrics.get_counter(names::TXN_COMMITTED).unwrap_or(0),
            avg_block_size: mean(names::BLOCK_SIZE),
            avg_create_ms: mean(names::BLOCK_CREATE_MS),
            avg_process_ms: mean(names::BLOCK_PROCESS_MS),
            avg_vote_ms: mean(names::VOTE_MS),
            avg_round_ms: mean(names::ROUND_MS),
            avg_latency_ms: mean(names::TXN_LATENCY_MS),
            throughput,
        };
        debug!(
            "stats after {:.2}s: {} committed, {:.1} txs/s",
            report.elapsed_secs, report.committed_txns, report.throughput
        );
        report
    }

    /// Export every recorded metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_and_committed_counters() {
        let stats = Statistics::new();
        stats.received();
        stats.received();
        stats.add_committed_txns(3);

        let report = stats.query();
        assert_eq!(report.received, 2);
        assert_eq!(report.committed_txns, 3);
        assert_eq!(stats.metrics().get_counter(names::BLOCK_COMMITTED), Some(1));
    }

    #[test]
    fn test_query_resets_throughput_window() {
        let stats = Statistics::new();
        stats.start_signal();
        stats.add_committed_txns(10);
        std::thread::sleep(Duration::from_millis(5));

        let first = stats.query();
        assert!(first.throughput > 0.0);

        let second = stats.query();
        assert_eq!(second.throughput, 0.0);
        assert_eq!(second.committed_txns, 10);
    }

    #[test]
    fn test_block_averages() {
        let stats = Statistics::new();
        stats.proposed_block(4);
        stats.proposed_block(6);
        stats.metrics().histogram(names::BLOCK_CREATE_MS, 2.0);
        stats.metrics().histogram(names::BLOCK_CREATE_MS, 4.0);
        stats.processed(Duration::from_millis(10));
        stats.voted(Duration::from_millis(1));
        stats.add_latency(Duration::from_millis(30));

        let report = stats.query();
        assert_eq!(report.avg_block_size, 5.0);
        assert!((report.avg_create_ms - 3.0).abs() < 1e-9);
        assert!((report.avg_process_ms - 10.0).abs() < 1e-9);
        assert!((report.avg_vote_ms - 1.0).abs() < 1e-9);
        assert!((report.avg_latency_ms - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_time_records_each_view() {
        let stats = Statistics::new();
        stats.round_time(1);
        stats.round_time(2);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.histograms[names::ROUND_MS].count, 2);
        assert_eq!(snapshot.gauges[names::CURRENT_VIEW], 2);
    }

    #[test]
    fn test_empty_report() {
        let report = Statistics::new().query();
        assert_eq!(report.avg_block_size, 0.0);
        assert_eq!(report.committed_txns, 0);
    }

    #[test]
    fn test_snapshot_contains_names() {
        let stats = Statistics::new();
        stats.received();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.counters.get(names::TXN_RECEIVED), Some(&1));
    }
}
