//! # tempo-consensus
//!
//! Chained HotStuff consensus core for tempo.
//!
//! This crate provides:
//! - Round-robin leader election
//! - A pacemaker synchronizing views through timeout certificates
//! - Pluggable safety rules (voting, commit, fork choice)
//! - The block tree ledger aggregating votes and executing commits
//! - Certificate checks against the participant set ([`verify_qc`])
//!
//! ## Architecture
//!
//! ```text
//! +-------------+     +-------------+
//! |  Election   |<----|  Pacemaker  |--> view-entry events
//! +-------------+     +-------------+
//!                            |
//! +-------------+     +-------------+
//! |   Safety    |---->| BlockChain  |  <- block tree, vote tally
//! +-------------+     +-------------+
//! ```
//!
//! Each component owns its state behind its own lock, so a vote being
//! tallied never waits on a view change and vice versa.
//!
//! ## Usage
//!
//! ```ignore
//! use tempo_consensus::{BlockChain, ConsensusConfig, HotStuff, Pacemaker, Rotation};
//!
//! let config = ConsensusConfig::new(NodeId::new(1), 4, 1);
//! let election = Arc::new(Rotation::new(config.peers));
//! let ledger = Arc::new(BlockChain::new(&config));
//! let safety = HotStuff::new(Arc::clone(&ledger), config.fork_choice);
//! let pacemaker = Pacemaker::new(&config, election, transport);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blockchain;
pub mod config;
pub mod election;
pub mod error;
pub mod pacemaker;
pub mod safety;

pub use blockchain::{verify_qc, BlockChain, ChainStatus};
pub use config::{ConsensusConfig, DEFAULT_MIN_COMMIT_VIEW};
pub use election::{Election, Rotation};
pub use error::{ConsensusError, ConsensusResult};
pub use pacemaker::Pacemaker;
pub use safety::{ForkChoice, HotStuff, Safety};
