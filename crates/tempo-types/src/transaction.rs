//! Client transactions

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tempo_crypto::ContentHasher;
use tempo_primitives::{NodeId, View, H256};

/// A client command waiting to be ordered.
///
/// `origin` is the replica responsible for replying to the client once the
/// transaction commits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content-derived identifier
    pub id: H256,
    /// Replica that releases the reply on commit
    pub origin: NodeId,
    /// Opaque command bytes
    pub command: Bytes,
    /// Submission time (Unix milliseconds)
    pub timestamp_ms: u64,
}

impl Transaction {
    /// Create a transaction submitted now.
    ///
    /// `seq` distinguishes otherwise identical commands from the same origin.
    pub fn new(origin: NodeId, seq: u64, command: Bytes) -> Self {
        Self::with_timestamp(origin, seq, command, now_ms())
    }

    /// Create a transaction with an explicit submission time
    pub fn with_timestamp(origin: NodeId, seq: u64, command: Bytes, timestamp_ms: u64) -> Self {
        let id = ContentHasher::new()
            .u32(origin.index())
            .u64(seq)
            .bytes(&command)
            .finish();
        Self {
            id,
            origin,
            command,
            timestamp_ms,
        }
    }

    /// Milliseconds elapsed since submission
    pub fn age_ms(&self) -> u64 {
        now_ms().saturating_sub(self.timestamp_ms)
    }
}

/// Notification released to the client once its transaction commits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReply {
    /// Committed transaction
    pub txn_id: H256,
    /// Replica that released the reply
    pub origin: NodeId,
    /// Block that carried the transaction
    pub block_id: H256,
    /// View of that block
    pub view: View,
    /// Submission-to-commit latency in milliseconds
    pub latency_ms: u64,
}

/// Current wall-clock time in Unix milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
