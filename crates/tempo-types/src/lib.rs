//! # tempo-types
//!
//! Protocol data types for tempo.
//!
//! This crate provides:
//! - [`Transaction`](transaction::Transaction) - client commands and their replies
//! - [`Block`](block::Block) - proposals chained through embedded quorum certificates
//! - [`Vote`], [`QuorumCert`], [`Tmo`], [`TimeoutCert`] - endorsements and their aggregates
//! - [`Message`](message::Message) - the envelope exchanged between replicas

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod certificate;
pub mod message;
pub mod transaction;

// Re-export commonly used types
pub use block::Block;
pub use certificate::{QuorumCert, TimeoutCert, Tmo, Vote};
pub use message::Message;
pub use transaction::{Transaction, TransactionReply};
