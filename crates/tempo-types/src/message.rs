//! Replica-to-replica message envelope

use crate::block::Block;
use crate::certificate::{QuorumCert, TimeoutCert, Tmo, Vote};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use tempo_primitives::View;

/// Every message a replica can receive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Proposal from the leader of a view
    Block(Block),
    /// Vote sent to the next leader
    Vote(Vote),
    /// Quorum certificate
    Qc(QuorumCert),
    /// Timeout endorsement
    Tmo(Tmo),
    /// Timeout certificate
    Tc(TimeoutCert),
    /// Client transaction
    Transaction(Transaction),
}

impl Message {
    /// View the message belongs to, if it is a protocol message
    pub fn view(&self) -> Option<View> {
        match self {
            Message::Block(b) => Some(b.view),
            Message::Vote(v) => Some(v.view),
            Message::Qc(qc) => Some(qc.view),
            Message::Tmo(tmo) => Some(tmo.view),
            Message::Tc(tc) => Some(tc.view),
            Message::Transaction(_) => None,
        }
    }

    /// Short name of the message kind, for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Block(_) => "block",
            Message::Vote(_) => "vote",
            Message::Qc(_) => "qc",
            Message::Tmo(_) => "tmo",
            Message::Tc(_) => "tc",
            Message::Transaction(_) => "transaction",
        }
    }
}
