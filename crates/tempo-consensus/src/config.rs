//! Consensus configuration

use crate::error::{ConsensusError, ConsensusResult};
use crate::safety::ForkChoice;
use std::collections::BTreeSet;
use tempo_primitives::{NodeId, View};

/// Certificates for views below this are never fed to the commit rule
pub const DEFAULT_MIN_COMMIT_VIEW: View = 3;

/// Per-replica consensus configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusConfig {
    /// Local identity
    pub node_id: NodeId,
    /// Number of participants (N); identities are `1..=N`
    pub peers: u32,
    /// Tolerated Byzantine participants (f)
    pub fault_bound: u32,
    /// Whether the local replica simulates Byzantine behavior
    pub byzantine: bool,
    /// Parent selection policy for proposals
    pub fork_choice: ForkChoice,
    /// Minimum certified view before the commit rule is attempted
    pub min_commit_view: View,
    /// Participants simulating Byzantine behavior, for chain quality
    pub byzantine_nodes: BTreeSet<NodeId>,
}

impl ConsensusConfig {
    /// Honest configuration for `node_id` in a cluster of `peers` tolerating `fault_bound`
    pub fn new(node_id: NodeId, peers: u32, fault_bound: u32) -> Self {
        Self {
            node_id,
            peers,
            fault_bound,
            byzantine: false,
            fork_choice: ForkChoice::Highest,
            min_commit_view: DEFAULT_MIN_COMMIT_VIEW,
            byzantine_nodes: BTreeSet::new(),
        }
    }

    /// Mark `nodes` as Byzantine; the local flag follows membership
    pub fn with_byzantine_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.byzantine_nodes = nodes.into_iter().collect();
        self.byzantine = self.byzantine_nodes.contains(&self.node_id);
        self
    }

    /// Set the fork-choice policy
    pub fn with_fork_choice(mut self, fork_choice: ForkChoice) -> Self {
        self.fork_choice = fork_choice;
        self
    }

    /// Set the minimum commit view
    pub fn with_min_commit_view(mut self, view: View) -> Self {
        self.min_commit_view = view;
        self
    }

    /// Distinct endorsements needed for a certificate (N - f)
    pub fn quorum_threshold(&self) -> usize {
        self.peers.saturating_sub(self.fault_bound) as usize
    }

    /// Whether `id` is one of the `1..=N` participants
    pub fn is_participant(&self, id: NodeId) -> bool {
        id.is_member_of(self.peers)
    }

    /// Whether `id` simulates Byzantine behavior
    pub fn is_byzantine_node(&self, id: NodeId) -> bool {
        self.byzantine_nodes.contains(&id)
    }

    /// Check the configuration
    pub fn validate(&self) -> ConsensusResult<()> {
        if self.peers == 0 {
            return Err(ConsensusError::Config("at least one participant is required".into()));
        }
        if self.peers <= 3 * self.fault_bound {
            return Err(ConsensusError::Config(format!(
                "{} participants cannot tolerate {} faults (N must exceed 3f)",
                self.peers, self.fault_bound
            )));
        }
        if !self.is_participant(self.node_id) {
            return Err(ConsensusError::Config(format!(
                "node id {} is outside 1..={}",
                self.node_id, self.peers
            )));
        }
        if let Some(id) = self.byzantine_nodes.iter().find(|id| !self.is_participant(**id)) {
            return Err(ConsensusError::Config(format!(
                "byzantine node {} is outside 1..={}",
                id, self.peers
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ConsensusConfig::new(NodeId::new(1), 4, 1);
        assert!(!config.byzantine);
        assert_eq!(config.fork_choice, ForkChoice::Highest);
        assert_eq!(config.min_commit_view, DEFAULT_MIN_COMMIT_VIEW);
        assert_eq!(config.quorum_threshold(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_too_many_faults() {
        let config = ConsensusConfig::new(NodeId::new(1), 3, 1);
        assert!(matches!(config.validate(), Err(ConsensusError::Config(_))));
    }

    #[test]
    fn test_config_rejects_empty_cluster() {
        let config = ConsensusConfig::new(NodeId::new(1), 0, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_foreign_node() {
        let config = ConsensusConfig::new(NodeId::new(5), 4, 1);
        assert!(config.validate().is_err());
        let config = ConsensusConfig::new(NodeId::new(1), 4, 1)
            .with_byzantine_nodes([NodeId::new(9)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_byzantine_membership() {
        let config = ConsensusConfig::new(NodeId::new(1), 4, 1)
            .with_byzantine_nodes([NodeId::new(1)]);
        assert!(config.byzantine);
        assert!(config.is_byzantine_node(NodeId::new(1)));
        assert!(!config.is_byzantine_node(NodeId::new(2)));

        let honest = ConsensusConfig::new(NodeId::new(2), 4, 1)
            .with_byzantine_nodes([NodeId::new(1)]);
        assert!(!honest.byzantine);
    }

    #[test]
    fn test_single_node_cluster() {
        let config = ConsensusConfig::new(NodeId::new(1), 1, 0);
        assert!(config.validate().is_ok());
        assert_eq!(config.quorum_threshold(), 1);
    }
}
