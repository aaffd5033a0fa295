//! Configuration types for tempo-node

use crate::error::{NodeError, NodeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tempo_consensus::{ConsensusConfig, ForkChoice, DEFAULT_MIN_COMMIT_VIEW};
use tempo_primitives::{NodeId, View};
use tempo_txpool::PoolConfig;

/// Replica configuration
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// Consensus configuration
    pub consensus: ConsensusConfig,
    /// Transaction pool configuration
    pub pool: PoolConfig,
    /// Local view timer
    pub view_timeout: Duration,
    /// Upper bound of the random delay before delivering a vote (ms)
    pub vote_delay_ms: u64,
    /// Upper bound of the random delay before broadcasting a proposal (ms)
    pub propose_delay_ms: u64,
}

impl ReplicaConfig {
    /// Replica with default pool and timer settings and no simulated delays
    pub fn new(consensus: ConsensusConfig) -> Self {
        Self {
            consensus,
            pool: PoolConfig::default(),
            view_timeout: Duration::from_millis(default_view_timeout_ms()),
            vote_delay_ms: 0,
            propose_delay_ms: 0,
        }
    }
}

/// Simulation configuration, loadable from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of replicas (N)
    #[serde(default = "default_peers")]
    pub peers: u32,
    /// Tolerated Byzantine replicas (f)
    #[serde(default = "default_fault_bound")]
    pub fault_bound: u32,
    /// Replicas `1..=byzantine_count` simulate Byzantine behavior
    #[serde(default)]
    pub byzantine_count: u32,
    /// Safety rule family; `"hotstuff"` or anything else for the default rules
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Local view timer (ms)
    #[serde(default = "default_view_timeout_ms")]
    pub view_timeout_ms: u64,
    /// Maximum transactions per block
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum buffered transactions per replica
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    /// Minimum certified view before committing
    #[serde(default = "default_min_commit_view")]
    pub min_commit_view: View,
    /// Upper bound of the random network latency (ms)
    #[serde(default = "default_network_delay_ms")]
    pub network_delay_ms: u64,
    /// Upper bound of the random delay before a vote (ms)
    #[serde(default = "default_vote_delay_ms")]
    pub vote_delay_ms: u64,
    /// Upper bound of the random delay before a proposal (ms)
    #[serde(default = "default_propose_delay_ms")]
    pub propose_delay_ms: u64,
    /// Interval between client transactions (ms)
    #[serde(default = "default_txn_interval_ms")]
    pub txn_interval_ms: u64,
    /// Length of the run (s)
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

fn default_peers() -> u32 {
    4
}

fn default_fault_bound() -> u32 {
    1
}

fn default_algorithm() -> String {
    "hotstuff".to_string()
}

fn default_view_timeout_ms() -> u64 {
    500
}

fn default_batch_size() -> usize {
    100
}

fn default_max_pending() -> usize {
    100_000
}

fn default_min_commit_view() -> View {
    DEFAULT_MIN_COMMIT_VIEW
}

fn default_network_delay_ms() -> u64 {
    2
}

fn default_vote_delay_ms() -> u64 {
    20
}

fn default_propose_delay_ms() -> u64 {
    50
}

fn default_txn_interval_ms() -> u64 {
    10
}

fn default_duration_secs() -> u64 {
    10
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            peers: default_peers(),
            fault_bound: default_fault_bound(),
            byzantine_count: 0,
            algorithm: default_algorithm(),
            view_timeout_ms: default_view_timeout_ms(),
            batch_size: default_batch_size(),
            max_pending: default_max_pending(),
            min_commit_view: default_min_commit_view(),
            network_delay_ms: default_network_delay_ms(),
            vote_delay_ms: default_vote_delay_ms(),
            propose_delay_ms: default_propose_delay_ms(),
            txn_interval_ms: default_txn_interval_ms(),
            duration_secs: default_duration_secs(),
        }
    }
}

impl SimConfig {
    /// Load from a JSON file; absent fields take their defaults
    pub fn load(path: &Path) -> NodeResult<Self> {
        tracing::info!("Loading simulation config from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Check every value
    pub fn validate(&self) -> NodeResult<()> {
        if self.byzantine_count > self.peers {
            return Err(NodeError::Config(format!(
                "{} byzantine replicas out of {}",
                self.byzantine_count, self.peers
            )));
        }
        if self.view_timeout_ms == 0 {
            return Err(NodeError::Config("view timeout must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(NodeError::Config("batch size must be positive".into()));
        }
        if self.txn_interval_ms == 0 {
            return Err(NodeError::Config("transaction interval must be positive".into()));
        }
        for id in self.node_ids() {
            self.consensus_config(id).validate()?;
        }
        Ok(())
    }

    /// Identities `1..=N`
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (1..=self.peers).map(NodeId::new)
    }

    /// Identities simulating Byzantine behavior
    pub fn byzantine_nodes(&self) -> impl Iterator<Item = NodeId> {
        (1..=self.byzantine_count).map(NodeId::new)
    }

    /// Consensus configuration of replica `id`
    pub fn consensus_config(&self, id: NodeId) -> ConsensusConfig {
        let config = ConsensusConfig::new(id, self.peers, self.fault_bound)
            .with_byzantine_nodes(self.byzantine_nodes())
            .with_min_commit_view(self.min_commit_view);
        let fork_choice = ForkChoice::for_algorithm(&self.algorithm, config.byzantine);
        config.with_fork_choice(fork_choice)
    }

    /// Full configuration of replica `id`
    pub fn replica_config(&self, id: NodeId) -> ReplicaConfig {
        ReplicaConfig {
            consensus: self.consensus_config(id),
            pool: PoolConfig {
                max_pending: self.max_pending,
                batch_size: self.batch_size,
            },
            view_timeout: Duration::from_millis(self.view_timeout_ms),
            vote_delay_ms: self.vote_delay_ms,
            propose_delay_ms: self.propose_delay_ms,
        }
    }
}
