//! Block tree, vote aggregation and commit execution

use crate::config::ConsensusConfig;
use crate::error::{ConsensusError, ConsensusResult};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tempo_primitives::{NodeId, View, H256};
use tempo_types::{Block, QuorumCert, Vote};
use tracing::{debug, info};

/// Commit progress of one replica's ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainStatus {
    /// Committed blocks, genesis excluded
    pub committed: u64,
    /// Committed blocks proposed by honest replicas
    pub honest_committed: u64,
    /// View of the latest committed block
    pub highest_committed_view: View,
    /// Committed blocks per elapsed view
    pub chain_growth: f64,
    /// Share of committed blocks proposed by honest replicas
    pub chain_quality: f64,
}

struct BlockTree {
    blocks: HashMap<H256, Block>,
    committed: HashSet<H256>,
    /// Committed ids in commit order, genesis first
    committed_order: Vec<H256>,
    last_committed: H256,
    last_committed_view: View,
    high_qc: QuorumCert,
    honest_committed: u64,
}

/// In-memory ledger of one replica.
///
/// The block tree and the vote tally sit behind separate locks so vote
/// aggregation never contends with block insertion or commits.
pub struct BlockChain {
    threshold: usize,
    peers: u32,
    byzantine_nodes: BTreeSet<NodeId>,
    tree: RwLock<BlockTree>,
    votes: Mutex<HashMap<(View, H256), HashSet<NodeId>>>,
}

impl BlockChain {
    /// Create a ledger holding only the committed genesis block
    pub fn new(config: &ConsensusConfig) -> Self {
        let genesis = Block::genesis();
        let genesis_id = genesis.id;
        let mut blocks = HashMap::new();
        blocks.insert(genesis_id, genesis);

        Self {
            threshold: config.quorum_threshold(),
            peers: config.peers,
            byzantine_nodes: config.byzantine_nodes.clone(),
            tree: RwLock::new(BlockTree {
                blocks,
                committed: HashSet::from([genesis_id]),
                committed_order: vec![genesis_id],
                last_committed: genesis_id,
                last_committed_view: 0,
                high_qc: QuorumCert::genesis(genesis_id),
                honest_committed: 0,
            }),
            votes: Mutex::new(HashMap::new()),
        }
    }

    /// Store a block; re-inserting a known block is a no-op
    pub fn add_block(&self, block: Block) {
        let mut tree = self.tree.write();
        if tree.blocks.contains_key(&block.id) {
            return;
        }
        debug!(
            "stored block {} of view {} from {}",
            block.id.short(),
            block.view,
            block.proposer
        );
        tree.blocks.insert(block.id, block);
    }

    /// Look up a block
    pub fn get_block(&self, id: &H256) -> Option<Block> {
        self.tree.read().blocks.get(id).cloned()
    }

    /// Whether a block is stored
    pub fn contains(&self, id: &H256) -> bool {
        self.tree.read().blocks.contains_key(id)
    }

    /// Number of stored blocks, genesis included
    pub fn len(&self) -> usize {
        self.tree.read().blocks.len()
    }

    /// Always false: genesis is stored from the start
    pub fn is_empty(&self) -> bool {
        self.tree.read().blocks.is_empty()
    }

    /// Tally a vote; returns the certificate the moment the quorum is reached.
    ///
    /// Each distinct voter counts once, so a certificate is produced at most
    /// once per `(view, block)`.
    pub fn add_vote(&self, vote: Vote) -> ConsensusResult<Option<QuorumCert>> {
        if !vote.voter.is_member_of(self.peers) {
            return Err(ConsensusError::InvalidVoter(vote.voter));
        }

        let mut votes = self.votes.lock();
        let voters = votes.entry((vote.view, vote.block_id)).or_default();
        if !voters.insert(vote.voter) {
            return Ok(None);
        }
        if voters.len() != self.threshold {
            return Ok(None);
        }
        let qc = QuorumCert::new(vote.view, vote.block_id, voters.iter().copied().collect());
        drop(votes);

        debug!(
            "certificate for block {} of view {} built",
            qc.block_id.short(),
            qc.view
        );
        Ok(Some(qc))
    }

    /// Adopt `qc` as the highest certificate if it is newer
    pub fn observe_qc(&self, qc: &QuorumCert) -> bool {
        let mut tree = self.tree.write();
        if qc.view > tree.high_qc.view {
            tree.high_qc = qc.clone();
            true
        } else {
            false
        }
    }

    /// Overwrite the highest certificate unconditionally.
    ///
    /// Only used by replicas simulating a forking attack.
    pub fn update_high_qc(&self, qc: QuorumCert) {
        self.tree.write().high_qc = qc;
    }

    /// Highest certificate observed
    pub fn high_qc(&self) -> QuorumCert {
        self.tree.read().high_qc.clone()
    }

    /// Whether a block has been committed
    pub fn is_committed(&self, id: &H256) -> bool {
        self.tree.read().committed.contains(id)
    }

    /// Commit `id` and every uncommitted ancestor.
    ///
    /// Returns the newly committed blocks oldest first; committing an already
    /// committed block returns an empty sequence.
    pub fn commit_block(&self, id: &H256) -> ConsensusResult<Vec<Block>> {
        let mut tree = self.tree.write();
        if tree.committed.contains(id) {
            return Ok(Vec::new());
        }
        if !tree.blocks.contains_key(id) {
            return Err(ConsensusError::BlockNotFound(*id));
        }

        let mut path = Vec::new();
        let mut cursor = *id;
        while !tree.committed.contains(&cursor) {
            let block = tree
                .blocks
                .get(&cursor)
                .ok_or(ConsensusError::UnreachableCommit {
                    target: *id,
                    missing: cursor,
                })?;
            if block.view <= tree.last_committed_view {
                return Err(ConsensusError::ConflictingBranch(*id));
            }
            path.push(block.clone());
            cursor = block.parent_id();
        }
        if cursor != tree.last_committed {
            return Err(ConsensusError::ConflictingBranch(*id));
        }

        path.reverse();
        for block in &path {
            tree.committed.insert(block.id);
            tree.committed_order.push(block.id);
            if !self.byzantine_nodes.contains(&block.proposer) {
                tree.honest_committed += 1;
            }
        }
        if let Some(last) = path.last() {
            tree.last_committed = last.id;
            tree.last_committed_view = last.view;
            info!(
                "committed {} blocks up to {} at view {}",
                path.len(),
                last.id.short(),
                last.view
            );
        }
        Ok(path)
    }

    /// Committed block ids in commit order, genesis excluded
    pub fn committed_ids(&self) -> Vec<H256> {
        self.tree.read().committed_order[1..].to_vec()
    }

    /// Latest committed block
    pub fn last_committed(&self) -> (H256, View) {
        let tree = self.tree.read();
        (tree.last_committed, tree.last_committed_view)
    }

    /// Commit statistics after `views` elapsed views
    pub fn chain_status(&self, views: View) -> ChainStatus {
        let tree = self.tree.read();
        let committed = (tree.committed_order.len() - 1) as u64;
        ChainStatus {
            committed,
            honest_committed: tree.honest_committed,
            highest_committed_view: tree.last_committed_view,
            chain_growth: ratio(committed, views),
            chain_quality: ratio(tree.honest_committed, committed),
        }
    }
}

/// Check that `qc` carries at least N - f distinct endorsements, all from
/// participants. The genesis certificate is the only one without signers.
pub fn verify_qc(qc: &QuorumCert, config: &ConsensusConfig) -> ConsensusResult<()> {
    if qc.view == 0 && *qc == QuorumCert::genesis(Block::genesis().id) {
        return Ok(());
    }
    if let Some(id) = qc.signers.iter().find(|id| !config.is_participant(**id)) {
        return Err(ConsensusError::InvalidVoter(*id));
    }
    let endorsements = qc.signers.iter().collect::<BTreeSet<_>>().len();
    let threshold = config.quorum_threshold();
    if endorsements < threshold {
        return Err(ConsensusError::WeakCertificate {
            view: qc.view,
            endorsements,
            threshold,
        });
    }
    Ok(())
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
