//! # tempo-node
//!
//! Replica driver and simulation harness for tempo.
//!
//! This crate provides:
//! - [`Replica`] - the event loop wiring transport, pool and consensus core
//! - [`Simulation`] - an in-memory cluster with a synthetic client
//! - [`SimConfig`] - JSON-loadable run configuration
//!
//! ## Architecture
//!
//! ```text
//! Envelope --> staleness guard --> +--------------------------+
//!                                  | block | qc   (latest)    |
//!                                  | vote  | tmo  (depth 1)   |
//!                                  +--------------------------+
//!                                               |
//! view entries + local timer ----------> event loop --> one task per event
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use tempo_node::{SimConfig, Simulation};
//!
//! let simulation = Simulation::new(SimConfig::default())?;
//! let report = simulation.run_for(Duration::from_secs(2)).await?;
//! assert!(report.check_commit_safety());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod replica;
pub mod simulation;

pub use config::{ReplicaConfig, SimConfig};
pub use error::{NodeError, NodeResult};
pub use replica::{Replica, ReplicaCounters};
pub use simulation::{ReplicaReport, Simulation, SimulationReport};
