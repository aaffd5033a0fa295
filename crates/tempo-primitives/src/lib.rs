//! # tempo-primitives
//!
//! Primitive types shared by every tempo crate.
//!
//! This crate provides the fundamental identifiers of the protocol: the
//! content hash used for block identities, the participant identity and the
//! view counter.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod node_id;

pub use error::PrimitiveError;
pub use hash::{HashError, H256};
pub use node_id::{NodeId, NodeIdError};

/// Logical round number of the protocol.
///
/// View 0 is the genesis view; the first proposal happens in view 1.
pub type View = u64;
