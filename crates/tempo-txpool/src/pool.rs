//! Transaction pool implementation

use crate::error::{TxPoolError, TxPoolResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tempo_primitives::{NodeId, View, H256};
use tempo_types::{Block, QuorumCert, Transaction};
use tracing::debug;

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of buffered transactions
    pub max_pending: usize,
    /// Maximum number of transactions per proposed block
    pub batch_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pending: 4096,
            batch_size: 100,
        }
    }
}

/// Transaction pool
///
/// Transactions stay addressable by id until [`TxPool::remove`] is called,
/// but each one is handed to [`TxPool::produce_block`] at most once.
pub struct TxPool {
    /// Configuration
    config: PoolConfig,
    /// All buffered transactions by id
    by_id: DashMap<H256, Transaction>,
    /// Ids in arrival order; removed ids are skipped lazily
    queue: Mutex<VecDeque<H256>>,
}

impl TxPool {
    /// Create new pool with config
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            by_id: DashMap::new(),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Create pool with default config
    pub fn with_defaults() -> Self {
        Self::new(PoolConfig::default())
    }

    /// Buffer a transaction
    pub fn collect(&self, txn: Transaction) -> TxPoolResult<()> {
        if self.by_id.contains_key(&txn.id) {
            return Err(TxPoolError::AlreadyExists(txn.id));
        }
        if self.by_id.len() >= self.config.max_pending {
            return Err(TxPoolError::PoolFull(self.config.max_pending));
        }
        let id = txn.id;
        self.by_id.insert(id, txn);
        self.queue.lock().push_back(id);
        Ok(())
    }

    /// Draft a block for `view` extending the block certified by `qc`.
    ///
    /// Up to `batch_size` buffered transactions are taken in arrival order.
    pub fn produce_block(&self, view: View, qc: QuorumCert, proposer: NodeId) -> Block {
        let payload = self.drain_batch();
        debug!(
            "[{}] drafted block for view {} with {} txns on parent {}",
            proposer,
            view,
            payload.len(),
            qc.block_id.short()
        );
        Block::new(view, proposer, qc, payload)
    }

    fn drain_batch(&self) -> Vec<Transaction> {
        let mut queue = self.queue.lock();
        let mut payload = Vec::with_capacity(self.config.batch_size.min(queue.len()));
        while payload.len() < self.config.batch_size {
            let Some(id) = queue.pop_front() else {
                break;
            };
            if let Some(txn) = self.by_id.get(&id) {
                payload.push(txn.clone());
            }
        }
        payload
    }

    /// Remove a transaction by id
    pub fn remove(&self, id: &H256) -> Option<Transaction> {
        let (_, txn) = self.by_id.remove(id)?;
        let mut queue = self.queue.lock();
        if queue.len() > 2 * self.by_id.len() + self.config.batch_size {
            queue.retain(|queued| self.by_id.contains_key(queued));
        }
        Some(txn)
    }

    /// Get transaction by id
    pub fn get(&self, id: &H256) -> Option<Transaction> {
        self.by_id.get(id).map(|r| r.clone())
    }

    /// Check whether a transaction is buffered
    pub fn contains(&self, id: &H256) -> bool {
        self.by_id.contains_key(id)
    }

    /// Number of buffered transactions
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check if pool is empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of buffered transactions not yet handed to a proposal
    pub fn queued_len(&self) -> usize {
        self.queue
            .lock()
            .iter()
            .filter(|id| self.by_id.contains_key(*id))
            .count()
    }

    /// Configured batch size
    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }
}
