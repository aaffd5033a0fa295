//! # tempo-txpool
//!
//! Pending transaction pool for tempo.
//!
//! This crate provides:
//! - Buffering of client transactions in arrival order
//! - Duplicate rejection and a size limit
//! - Draining a batch into a block proposal
//! - Removal of committed or proposed transactions
//!
//! ## Architecture
//!
//! ```text
//! +------------------+
//! |      TxPool      |
//! +------------------+
//!          |
//! +--------+---------+
//! | by id  |  queue  |  <- lookup / arrival order
//! +--------+---------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use tempo_txpool::{TxPool, PoolConfig};
//!
//! let pool = TxPool::with_defaults();
//! pool.collect(txn)?;
//! let block = pool.produce_block(view, high_qc, proposer);
//! pool.remove(&txn_id);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod pool;

pub use error::{TxPoolError, TxPoolResult};
pub use pool::{PoolConfig, TxPool};
