//! Leader election

use crate::error::{ConsensusError, ConsensusResult};
use tempo_primitives::{NodeId, View};

/// Maps each view to the single participant allowed to propose in it.
///
/// Implementations must be deterministic: every correct replica has to agree
/// on the leader of every view.
pub trait Election: Send + Sync {
    /// Leader of `view`
    fn leader_for(&self, view: View) -> NodeId;

    /// Whether `id` leads `view`
    fn is_leader(&self, id: NodeId, view: View) -> bool {
        self.leader_for(view) == id
    }

    /// Reject a proposal from anyone but the leader of `view`
    fn verify_leader(&self, proposer: NodeId, view: View) -> ConsensusResult<()> {
        if self.is_leader(proposer, view) {
            Ok(())
        } else {
            Err(ConsensusError::InvalidLeader { proposer, view })
        }
    }
}

/// Round-robin rotation: view `v` is led by `((v - 1) mod N) + 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    peers: u32,
}

impl Rotation {
    /// Rotation over `peers` participants
    pub fn new(peers: u32) -> Self {
        Self {
            peers: peers.max(1),
        }
    }

    /// Number of participants
    pub fn peers(&self) -> u32 {
        self.peers
    }
}

impl Election for Rotation {
    fn leader_for(&self, view: View) -> NodeId {
        // view 0 is never proposed in; it maps to the leader of view 1
        let slot = view.saturating_sub(1) % u64::from(self.peers);
        NodeId::new(slot as u32 + 1)
    }
}
