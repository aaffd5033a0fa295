//! In-memory cluster of replicas driven by a synthetic client

use crate::config::SimConfig;
use crate::error::NodeResult;
use crate::replica::{Replica, ReplicaCounters};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempo_consensus::ChainStatus;
use tempo_metrics::{MetricsSnapshot, StatsReport};
use tempo_network::{Envelope, NetworkConfig, SimNetwork};
use tempo_primitives::{NodeId, View, H256};
use tempo_types::{Transaction, TransactionReply};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// End state of one replica
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaReport {
    /// Replica identity
    pub id: NodeId,
    /// Whether it simulated Byzantine behavior
    pub byzantine: bool,
    /// View at shutdown
    pub view: View,
    /// Commit statistics
    pub chain: ChainStatus,
    /// Committed block ids in commit order
    pub committed: Vec<H256>,
    /// Driver counters
    pub counters: ReplicaCounters,
    /// Averages and throughput
    pub stats: StatsReport,
    /// Every recorded metric
    pub metrics: MetricsSnapshot,
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Configuration the run used
    pub config: SimConfig,
    /// Wall-clock length of the run
    pub elapsed_secs: f64,
    /// Transactions submitted by the client
    pub submitted: u64,
    /// Replies released for committed transactions
    pub replies: u64,
    /// Messages handed to an inbox
    pub messages_delivered: u64,
    /// Messages lost in the network
    pub messages_dropped: u64,
    /// Encoded bytes routed
    pub bytes_routed: u64,
    /// Per-replica end state, ordered by identity
    pub replicas: Vec<ReplicaReport>,
}

impl SimulationReport {
    /// Whether every pair of committed sequences is prefix-ordered
    pub fn check_commit_safety(&self) -> bool {
        self.replicas.iter().enumerate().all(|(i, a)| {
            self.replicas[i + 1..]
                .iter()
                .all(|b| is_prefix_ordered(&a.committed, &b.committed))
        })
    }

    /// Smallest number of blocks committed by an honest replica
    pub fn min_honest_committed(&self) -> u64 {
        self.replicas
            .iter()
            .filter(|r| !r.byzantine)
            .map(|r| r.chain.committed)
            .min()
            .unwrap_or(0)
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> NodeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn is_prefix_ordered(a: &[H256], b: &[H256]) -> bool {
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

/// N replicas connected by a [`SimNetwork`]
pub struct Simulation {
    config: SimConfig,
    network: SimNetwork,
    replicas: Vec<Arc<Replica>>,
    inboxes: Vec<mpsc::UnboundedReceiver<Envelope>>,
    replies: mpsc::UnboundedReceiver<TransactionReply>,
}

impl Simulation {
    /// Build the cluster; nothing runs until [`Simulation::run`]
    pub fn new(config: SimConfig) -> NodeResult<Self> {
        config.validate()?;

        let network = SimNetwork::new(NetworkConfig {
            min_delay_ms: 0,
            max_delay_ms: config.network_delay_ms,
            wire_codec: true,
        });
        let (replies_tx, replies) = mpsc::unbounded_channel();

        let mut replicas = Vec::with_capacity(config.peers as usize);
        let mut inboxes = Vec::with_capacity(config.peers as usize);
        for id in config.node_ids() {
            let (transport, inbox) = network.register(id)?;
            let replica = Replica::new(
                config.replica_config(id),
                Arc::new(transport),
                Some(replies_tx.clone()),
            )?;
            replicas.push(replica);
            inboxes.push(inbox);
        }

        Ok(Self {
            config,
            network,
            replicas,
            inboxes,
            replies,
        })
    }

    /// Replicas in identity order
    pub fn replicas(&self) -> &[Arc<Replica>] {
        &self.replicas
    }

    /// Run for the configured duration
    pub async fn run(self) -> NodeResult<SimulationReport> {
        let duration = Duration::from_secs(self.config.duration_secs);
        self.run_for(duration).await
    }

    /// Run for `duration`
    pub async fn run_for(self, duration: Duration) -> NodeResult<SimulationReport> {
        self.run_until(tokio::time::sleep(duration)).await
    }

    /// Run until `stop` completes, then shut every replica down
    pub async fn run_until(mut self, stop: impl Future<Output = ()>) -> NodeResult<SimulationReport> {
        let started = Instant::now();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut handles = Vec::with_capacity(self.replicas.len());
        for (replica, inbox) in self.replicas.iter().zip(std::mem::take(&mut self.inboxes)) {
            handles.push(tokio::spawn(
                Arc::clone(replica).run(inbox, shutdown_rx.clone()),
            ));
        }
        let client = tokio::spawn(submit_transactions(
            self.replicas.clone(),
            Duration::from_millis(self.config.txn_interval_ms),
            shutdown_rx,
        ));

        info!(
            "simulating {} replicas ({} byzantine, algorithm {})",
            self.config.peers, self.config.byzantine_count, self.config.algorithm
        );
        stop.await;
        shutdown_tx.send_replace(true);

        let submitted = client.await?;
        for handle in handles {
            handle.await??;
        }

        let mut replies = 0;
        while self.replies.try_recv().is_ok() {
            replies += 1;
        }

        let traffic = self.network.stats();
        let report = SimulationReport {
            config: self.config.clone(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            submitted,
            replies,
            messages_delivered: traffic.delivered,
            messages_dropped: traffic.dropped,
            bytes_routed: traffic.bytes,
            replicas: self.replicas.iter().map(|r| replica_report(r)).collect(),
        };

        if !report.check_commit_safety() {
            warn!("replicas committed conflicting blocks");
        }
        info!(
            "simulation finished after {:.2}s: {} submitted, {} replies, {} blocks committed by the slowest honest replica",
            report.elapsed_secs,
            report.submitted,
            report.replies,
            report.min_honest_committed()
        );
        Ok(report)
    }
}

fn replica_report(replica: &Replica) -> ReplicaReport {
    ReplicaReport {
        id: replica.id(),
        byzantine: replica.is_byzantine(),
        view: replica.current_view(),
        chain: replica.chain_status(),
        committed: replica.committed_ids(),
        counters: replica.counters(),
        stats: replica.stats().query(),
        metrics: replica.stats().snapshot(),
    }
}

/// Submit one transaction per tick to every replica; origins rotate
/// round-robin. Returns the number submitted.
async fn submit_transactions(
    replicas: Vec<Arc<Replica>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let peers = replicas.len() as u64;
    let mut ticker = tokio::time::interval(interval);
    let mut seq = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let origin = NodeId::new((seq % peers) as u32 + 1);
                let txn = Transaction::new(origin, seq, Bytes::from(format!("cmd-{seq}")));
                for replica in &replicas {
                    replica.handle_txn(txn.clone());
                }
                seq += 1;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    seq
}
