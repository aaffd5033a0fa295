//! # tempo-network
//!
//! Message transport for tempo replicas.
//!
//! This crate provides:
//! - The [`Transport`] contract the consensus core sends through
//! - An in-memory [`SimNetwork`] connecting replicas of one process
//! - Optional wire encoding and randomized delivery latency
//! - A recording transport for driving one replica by hand
//!
//! ## Architecture
//!
//! ```text
//! +-------------------+
//! |    SimNetwork     |  <- routing table NodeId -> inbox
//! +-------------------+
//!          |
//! +--------+--------+
//! | codec | latency |  <- per-message encode / delayed delivery
//! +--------+--------+
//!          |
//! +-------------------+
//! |  Envelope inbox   |  <- one unbounded queue per replica
//! +-------------------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use tempo_network::{NetworkConfig, SimNetwork, Transport};
//!
//! let network = SimNetwork::new(NetworkConfig::default());
//! let (transport, mut inbox) = network.register(NodeId::new(1))?;
//! transport.broadcast(message);
//! while let Some(envelope) = inbox.recv().await { /* ... */ }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod codec;
mod error;
mod recording;
mod sim;
mod traits;

pub use codec::{decode_message, encode_message};
pub use error::{NetworkError, NetworkResult};
pub use recording::{Outbound, RecordingTransport};
pub use sim::{Envelope, NetworkConfig, SimNetwork, SimTransport, TrafficStats};
pub use traits::Transport;
