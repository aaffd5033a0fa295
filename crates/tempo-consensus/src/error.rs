//! Consensus error types

use tempo_primitives::{NodeId, View, H256};
use thiserror::Error;

/// Consensus errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// Input belongs to a view the replica has already left
    #[error("stale view {view}, current view is {current}")]
    StaleView {
        /// View carried by the input
        view: View,
        /// Replica's current view
        current: View,
    },

    /// Proposal from a replica that does not lead its view
    #[error("node {proposer} is not the leader of view {view}")]
    InvalidLeader {
        /// Claimed proposer
        proposer: NodeId,
        /// View of the proposal
        view: View,
    },

    /// Commit target forks away from the committed prefix
    #[error("block {0:?} conflicts with the committed chain")]
    ConflictingBranch(H256),

    /// Block not found
    #[error("block not found: {0:?}")]
    BlockNotFound(H256),

    /// Commit target whose ancestry is incomplete
    #[error("cannot reach {target:?} from the last commit, missing {missing:?}")]
    UnreachableCommit {
        /// Block requested for commit
        target: H256,
        /// First ancestor that is not stored
        missing: H256,
    },

    /// Vote or timeout from an identity outside the participant set
    #[error("node {0} is not a participant")]
    InvalidVoter(NodeId),

    /// Certificate carrying fewer distinct endorsements than the quorum
    #[error("certificate of view {view} has {endorsements} endorsements, {threshold} required")]
    WeakCertificate {
        /// View of the certificate
        view: View,
        /// Distinct participant endorsements
        endorsements: usize,
        /// Endorsements a certificate needs (N - f)
        threshold: usize,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_stale_view() {
        let err = ConsensusError::StaleView {
            view: 3,
            current: 5,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("3"));
        assert!(msg.contains("5"));
    }

    #[test]
    fn test_error_display_invalid_leader() {
        let err = ConsensusError::InvalidLeader {
            proposer: NodeId::new(2),
            view: 1,
        };
        assert_eq!(format!("{}", err), "node 2 is not the leader of view 1");
    }

    #[test]
    fn test_error_display_block_not_found() {
        let err = ConsensusError::BlockNotFound(H256::from_bytes([0x42; 32]));
        assert!(format!("{}", err).contains("block not found"));
    }

    #[test]
    fn test_error_display_weak_certificate() {
        let err = ConsensusError::WeakCertificate {
            view: 50,
            endorsements: 1,
            threshold: 3,
        };
        assert_eq!(
            format!("{}", err),
            "certificate of view 50 has 1 endorsements, 3 required"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = ConsensusError::Config("too many faults".to_string());
        assert!(format!("{}", err).contains("too many faults"));
    }
}
