//! Node error types

use tempo_consensus::ConsensusError;
use tempo_network::NetworkError;
use tempo_primitives::NodeId;
use thiserror::Error;

/// Node errors
#[derive(Debug, Error)]
pub enum NodeError {
    /// Consensus error
    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),
    /// Network error
    #[error("network error: {0}")]
    Network(#[from] NetworkError),
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed configuration file
    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),
    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A spawned task panicked or was cancelled
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// The event loop of a replica was started twice
    #[error("replica {0} is already running")]
    AlreadyRunning(NodeId),
}

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;
