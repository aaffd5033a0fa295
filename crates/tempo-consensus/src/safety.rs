//! HotStuff safety rules

use crate::blockchain::{BlockChain, ChainStatus};
use crate::error::{ConsensusError, ConsensusResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tempo_primitives::{View, H256};
use tempo_types::{Block, QuorumCert};
use tracing::debug;

/// Parent selection policy for new proposals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkChoice {
    /// Extend the highest certified block
    #[default]
    Highest,
    /// Extend the parent of the highest certified block, creating a fork
    Forking,
    /// Same as `Highest`
    Default,
}

impl ForkChoice {
    /// Policy used by the `algorithm` setting of a simulation.
    ///
    /// `"hotstuff"` extends the highest certificate on honest replicas and
    /// forks on Byzantine ones; anything else falls back to `Default`.
    pub fn for_algorithm(algorithm: &str, byzantine: bool) -> Self {
        match algorithm {
            "hotstuff" if byzantine => ForkChoice::Forking,
            "hotstuff" => ForkChoice::Highest,
            _ => ForkChoice::Default,
        }
    }
}

impl FromStr for ForkChoice {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "highest" => Ok(ForkChoice::Highest),
            "forking" => Ok(ForkChoice::Forking),
            "default" => Ok(ForkChoice::Default),
            other => Err(ConsensusError::Config(format!("unknown fork choice: {}", other))),
        }
    }
}

impl fmt::Display for ForkChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ForkChoice::Highest => "highest",
            ForkChoice::Forking => "forking",
            ForkChoice::Default => "default",
        };
        f.write_str(name)
    }
}

/// Capabilities the replica driver needs from a safety rule set
pub trait Safety: Send + Sync {
    /// Whether the local replica may vote for `block`
    fn voting_rule(&self, block: &Block) -> ConsensusResult<bool>;

    /// Block made irreversible by `qc`, if any
    fn commit_rule(&self, qc: &QuorumCert) -> ConsensusResult<Option<Block>>;

    /// Record a processed certificate
    fn update_state_by_qc(&self, qc: &QuorumCert) -> ConsensusResult<()>;

    /// Record a vote cast in `view`
    fn update_state_by_view(&self, view: View) -> ConsensusResult<()>;

    /// Certificate the next proposal should extend
    fn forkchoice(&self) -> QuorumCert;

    /// Commit statistics of the underlying ledger after `views` elapsed views
    fn chain_status(&self, views: View) -> ChainStatus;
}

#[derive(Debug, Default)]
struct VotingState {
    last_voted_view: View,
    /// View of the highest certificate embedded in a certified block (the lock)
    preferred_view: View,
}

/// Chained HotStuff over a shared [`BlockChain`]
pub struct HotStuff {
    ledger: Arc<BlockChain>,
    fork_choice: ForkChoice,
    state: Mutex<VotingState>,
}

impl HotStuff {
    /// Create rules over `ledger` with the given proposal policy
    pub fn new(ledger: Arc<BlockChain>, fork_choice: ForkChoice) -> Self {
        Self {
            ledger,
            fork_choice,
            state: Mutex::new(VotingState::default()),
        }
    }

    /// Proposal policy in use
    pub fn fork_choice(&self) -> ForkChoice {
        self.fork_choice
    }

    /// Latest view voted in
    pub fn last_voted_view(&self) -> View {
        self.state.lock().last_voted_view
    }

    /// Current lock
    pub fn preferred_view(&self) -> View {
        self.state.lock().preferred_view
    }

    fn block(&self, id: &H256) -> ConsensusResult<Block> {
        self.ledger
            .get_block(id)
            .ok_or(ConsensusError::BlockNotFound(*id))
    }
}

impl Safety for HotStuff {
    fn voting_rule(&self, block: &Block) -> ConsensusResult<bool> {
        let parent = self.block(&block.parent_id())?;
        if block.view <= parent.view {
            return Ok(false);
        }
        let state = self.state.lock();
        if block.view <= state.last_voted_view {
            debug!(
                "already voted in view {}, refusing {}",
                state.last_voted_view,
                block.id.short()
            );
            return Ok(false);
        }
        if block.qc.view < state.preferred_view {
            debug!(
                "block {} extends view {} below the lock at {}",
                block.id.short(),
                block.qc.view,
                state.preferred_view
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn commit_rule(&self, qc: &QuorumCert) -> ConsensusResult<Option<Block>> {
        let b3 = self.block(&qc.block_id)?;
        if b3.is_genesis() {
            return Ok(None);
        }
        let b2 = self.block(&b3.parent_id())?;
        if b2.is_genesis() {
            return Ok(None);
        }
        let b1 = self.block(&b2.parent_id())?;
        if b1.view + 1 != b2.view || b2.view + 1 != b3.view {
            return Ok(None);
        }
        if self.ledger.is_committed(&b1.id) {
            return Ok(None);
        }
        Ok(Some(b1))
    }

    fn update_state_by_qc(&self, qc: &QuorumCert) -> ConsensusResult<()> {
        let certified = self.block(&qc.block_id)?;
        self.ledger.observe_qc(qc);
        let mut state = self.state.lock();
        if certified.qc.view > state.preferred_view {
            state.preferred_view = certified.qc.view;
        }
        Ok(())
    }

    fn update_state_by_view(&self, view: View) -> ConsensusResult<()> {
        let mut state = self.state.lock();
        if view > state.last_voted_view {
            state.last_voted_view = view;
        }
        Ok(())
    }

    fn forkchoice(&self) -> QuorumCert {
        let high_qc = self.ledger.high_qc();
        match self.fork_choice {
            ForkChoice::Highest | ForkChoice::Default => high_qc,
            ForkChoice::Forking => match self.ledger.get_block(&high_qc.block_id) {
                Some(block) if !block.is_genesis() => block.qc,
                _ => high_qc,
            },
        }
    }

    fn chain_status(&self, views: View) -> ChainStatus {
        self.ledger.chain_status(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsensusConfig;
    use tempo_primitives::NodeId;

    fn setup(fork_choice: ForkChoice) -> (Arc<BlockChain>, HotStuff) {
        let ledger = Arc::new(BlockChain::new(&ConsensusConfig::new(NodeId::new(1), 4, 1)));
        let safety = HotStuff::new(Arc::clone(&ledger), fork_choice);
        (ledger, safety)
    }

    fn certify(block: &Block) -> QuorumCert {
        QuorumCert::new(
            block.view,
            block.id,
            vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)],
        )
    }

    /// Store `len` blocks with contiguous views, each certified by the next
    fn chain(ledger: &BlockChain, len: usize) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut qc = QuorumCert::genesis(Block::genesis().id);
        for i in 0..len {
            let view = i as View + 1;
            let block = Block::new(view, NodeId::new(i as u32 % 4 + 1), qc, vec![]);
            ledger.add_block(block.clone());
            qc = certify(&block);
            blocks.push(block);
        }
        blocks
    }

    #[test]
    fn test_fork_choice_parse() {
        assert_eq!("highest".parse::<ForkChoice>().unwrap(), ForkChoice::Highest);
        assert_eq!("Forking".parse::<ForkChoice>().unwrap(), ForkChoice::Forking);
        assert_eq!("default".parse::<ForkChoice>().unwrap(), ForkChoice::Default);
        assert!("longest".parse::<ForkChoice>().is_err());
        assert_eq!(ForkChoice::Forking.to_string(), "forking");
    }

    #[test]
    fn test_fork_choice_for_algorithm() {
        assert_eq!(ForkChoice::for_algorithm("hotstuff", false), ForkChoice::Highest);
        assert_eq!(ForkChoice::for_algorithm("hotstuff", true), ForkChoice::Forking);
        assert_eq!(ForkChoice::for_algorithm("other", true), ForkChoice::Default);
    }

    #[test]
    fn test_vote_for_fresh_block() {
        let (ledger, safety) = setup(ForkChoice::Highest);
        let blocks = chain(&ledger, 1);
        assert_eq!(safety.voting_rule(&blocks[0]), Ok(true));
    }

    #[test]
    fn test_no_second_vote_in_same_view() {
        let (ledger, safety) = setup(ForkChoice::Highest);
        let blocks = chain(&ledger, 1);
        safety.update_state_by_view(1).unwrap();
        assert_eq!(safety.voting_rule(&blocks[0]), Ok(false));
        assert_eq!(safety.last_voted_view(), 1);
    }

    #[test]
    fn test_vote_requires_parent() {
        let (_ledger, safety) = setup(ForkChoice::Highest);
        let orphan_parent = H256::from_bytes([7; 32]);
        let block = Block::new(2, NodeId::new(2), QuorumCert::new(1, orphan_parent, vec![]), vec![]);
        assert_eq!(
            safety.voting_rule(&block),
            Err(ConsensusError::BlockNotFound(orphan_parent))
        );
    }

    #[test]
    fn test_lock_rejects_conflicting_branch() {
        let (ledger, safety) = setup(ForkChoice::Highest);
        let blocks = chain(&ledger, 3);
        // certificate for b3 locks on b2's certificate (view 2)
        safety.update_state_by_qc(&certify(&blocks[2])).unwrap();
        assert_eq!(safety.preferred_view(), 2);

        // a view-5 proposal extending b1 conflicts with the lock
        let fork = Block::new(5, NodeId::new(1), certify(&blocks[0]), vec![]);
        ledger.add_block(fork.clone());
        assert_eq!(safety.voting_rule(&fork), Ok(false));

        // extending b3 is fine
        let good = Block::new(5, NodeId::new(1), certify(&blocks[2]), vec![]);
        ledger.add_block(good.clone());
        assert_eq!(safety.voting_rule(&good), Ok(true));
    }

    #[test]
    fn test_update_state_by_qc_tracks_high_qc() {
        let (ledger, safety) = setup(ForkChoice::Highest);
        let blocks = chain(&ledger, 2);
        let qc = certify(&blocks[1]);
        safety.update_state_by_qc(&qc).unwrap();
        assert_eq!(ledger.high_qc(), qc);
        assert_eq!(safety.forkchoice(), qc);
    }

    #[test]
    fn test_update_state_by_unknown_qc() {
        let (ledger, safety) = setup(ForkChoice::Highest);
        let blocks = chain(&ledger, 2);
        safety.update_state_by_qc(&certify(&blocks[1])).unwrap();

        let qc = QuorumCert::new(4, H256::from_bytes([4; 32]), vec![]);
        assert!(matches!(
            safety.update_state_by_qc(&qc),
            Err(ConsensusError::BlockNotFound(_))
        ));
        // nothing recorded for a block we never stored
        assert_eq!(ledger.high_qc(), certify(&blocks[1]));
        assert_eq!(safety.forkchoice(), certify(&blocks[1]));
        assert_eq!(safety.preferred_view(), 1);
    }

    #[test]
    fn test_commit_rule_three_chain() {
        let (ledger, safety) = setup(ForkChoice::Highest);
        let blocks = chain(&ledger, 3);
        let committed = safety.commit_rule(&certify(&blocks[2])).unwrap();
        assert_eq!(committed, Some(blocks[0].clone()));
    }

    #[test]
    fn test_commit_rule_two_chain_not_ready() {
        let (ledger, safety) = setup(ForkChoice::Highest);
        let blocks = chain(&ledger, 2);
        assert_eq!(safety.commit_rule(&certify(&blocks[1])), Ok(None));
        assert_eq!(safety.commit_rule(&certify(&blocks[0])), Ok(None));
    }

    #[test]
    fn test_commit_rule_requires_contiguous_views() {
        let (ledger, safety) = setup(ForkChoice::Highest);
        let blocks = chain(&ledger, 2);
        // view gap between b2 and b3
        let b3 = Block::new(4, NodeId::new(4), certify(&blocks[1]), vec![]);
        ledger.add_block(b3.clone());
        assert_eq!(safety.commit_rule(&certify(&b3)), Ok(None));
    }

    #[test]
    fn test_commit_rule_skips_committed() {
        let (ledger, safety) = setup(ForkChoice::Highest);
        let blocks = chain(&ledger, 3);
        ledger.commit_block(&blocks[0].id).unwrap();
        assert_eq!(safety.commit_rule(&certify(&blocks[2])), Ok(None));
    }

    #[test]
    fn test_forking_extends_older_certificate() {
        let (ledger, safety) = setup(ForkChoice::Forking);
        assert_eq!(safety.forkchoice(), QuorumCert::genesis(Block::genesis().id));

        let blocks = chain(&ledger, 2);
        ledger.observe_qc(&certify(&blocks[1]));
        assert_eq!(safety.forkchoice(), certify(&blocks[0]));
    }

    #[test]
    fn test_default_behaves_like_highest() {
        let (ledger, safety) = setup(ForkChoice::Default);
        let blocks = chain(&ledger, 2);
        ledger.observe_qc(&certify(&blocks[1]));
        assert_eq!(safety.forkchoice(), certify(&blocks[1]));
    }
}
