//! Block proposals

use crate::certificate::QuorumCert;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use tempo_crypto::ContentHasher;
use tempo_primitives::{NodeId, View, H256};

/// A proposal extending the block certified by its embedded `qc`.
///
/// Blocks form a tree rooted at [`Block::genesis`]. The identifier is derived
/// from every other field, so a block is immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Content-derived identifier
    pub id: H256,
    /// View in which the block was proposed
    pub view: View,
    /// Proposing replica
    pub proposer: NodeId,
    /// Certificate for the parent block
    pub qc: QuorumCert,
    /// Ordered transactions
    pub payload: Vec<Transaction>,
}

impl Block {
    /// Build a block and derive its identifier
    pub fn new(view: View, proposer: NodeId, qc: QuorumCert, payload: Vec<Transaction>) -> Self {
        let id = Self::compute_id(view, proposer, &qc, &payload);
        Self {
            id,
            view,
            proposer,
            qc,
            payload,
        }
    }

    /// The root of every block tree. Identical on all replicas.
    pub fn genesis() -> Self {
        Self::new(
            0,
            NodeId::new(0),
            QuorumCert::genesis(H256::ZERO),
            Vec::new(),
        )
    }

    /// Identifier of the parent block
    pub fn parent_id(&self) -> H256 {
        self.qc.block_id
    }

    /// Whether this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.view == 0 && self.qc.block_id.is_zero()
    }

    /// Whether `id` matches the content
    pub fn verify_id(&self) -> bool {
        self.id == Self::compute_id(self.view, self.proposer, &self.qc, &self.payload)
    }

    /// Number of transactions carried
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    fn compute_id(view: View, proposer: NodeId, qc: &QuorumCert, payload: &[Transaction]) -> H256 {
        let mut hasher = ContentHasher::new()
            .u64(view)
            .u32(proposer.index())
            .u64(qc.view)
            .hash(&qc.block_id)
            .u64(payload.len() as u64);
        for txn in payload {
            hasher = hasher.hash(&txn.id);
        }
        hasher.finish()
    }
}
