//! Common error types for primitives

use crate::hash::HashError;
use crate::node_id::NodeIdError;
use thiserror::Error;

/// Primitive operation error
#[derive(Debug, Error)]
pub enum PrimitiveError {
    /// Node identity error
    #[error("node id error: {0}")]
    NodeId(#[from] NodeIdError),

    /// Hash error
    #[error("hash error: {0}")]
    Hash(#[from] HashError),
}
