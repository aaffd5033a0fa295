//! Votes, timeouts and their certificates

use serde::{Deserialize, Serialize};
use tempo_primitives::{NodeId, View, H256};

/// A replica's endorsement of a block proposed in `view`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vote {
    /// View of the endorsed block
    pub view: View,
    /// Endorsing replica
    pub voter: NodeId,
    /// Endorsed block
    pub block_id: H256,
}

impl Vote {
    /// Create a new vote
    pub fn new(view: View, voter: NodeId, block_id: H256) -> Self {
        Self {
            view,
            voter,
            block_id,
        }
    }
}

/// Proof that a quorum of distinct replicas voted for `block_id` at `view`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumCert {
    /// Certified view
    pub view: View,
    /// Certified block
    pub block_id: H256,
    /// Distinct endorsers, sorted
    pub signers: Vec<NodeId>,
}

impl QuorumCert {
    /// Create a certificate from its endorsers
    pub fn new(view: View, block_id: H256, mut signers: Vec<NodeId>) -> Self {
        signers.sort_unstable();
        signers.dedup();
        Self {
            view,
            block_id,
            signers,
        }
    }

    /// The self-evident certificate for the genesis block
    pub fn genesis(genesis_id: H256) -> Self {
        Self {
            view: 0,
            block_id: genesis_id,
            signers: Vec::new(),
        }
    }

    /// Number of distinct endorsers
    pub fn endorsements(&self) -> usize {
        self.signers.len()
    }
}

/// Timeout message: `node_id` gave up waiting on `view`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tmo {
    /// View that timed out
    pub view: View,
    /// Sender
    pub node_id: NodeId,
    /// Sender's best-known timeout certificate
    pub high_tc: TimeoutCert,
}

/// Proof that a quorum of replicas timed out the same view
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutCert {
    /// View that timed out
    pub view: View,
}

impl TimeoutCert {
    /// Create a timeout certificate
    pub fn new(view: View) -> Self {
        Self { view }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qc_signers_sorted_and_distinct() {
        let qc = QuorumCert::new(
            3,
            H256::ZERO,
            vec![NodeId::new(3), NodeId::new(1), NodeId::new(3), NodeId::new(2)],
        );
        assert_eq!(qc.signers, vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)]);
        assert_eq!(qc.endorsements(), 3);
    }

    #[test]
    fn test_genesis_qc() {
        let id = H256::from_bytes([1u8; 32]);
        let qc = QuorumCert::genesis(id);
        assert_eq!(qc.view, 0);
        assert_eq!(qc.block_id, id);
        assert_eq!(qc.endorsements(), 0);
    }

    #[test]
    fn test_timeout_cert_default_is_view_zero() {
        assert_eq!(TimeoutCert::default(), TimeoutCert::new(0));
    }
}
