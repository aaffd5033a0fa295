//! Participant identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Node identity parsing error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeIdError {
    /// Not a decimal number
    #[error("invalid node id: {0}")]
    Invalid(String),
    /// Identities are 1-indexed
    #[error("node id must be at least 1")]
    Zero,
}

/// Identity of a replica.
///
/// Identities are 1-indexed: a system of `N` participants uses `1..=N`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a node id. Callers are expected to pass a value `>= 1`.
    pub const fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// Numeric index of this node (1-based)
    pub const fn index(&self) -> u32 {
        self.0
    }

    /// Whether this identity is a member of a system of `peers` participants
    pub fn is_member_of(&self, peers: u32) -> bool {
        self.0 >= 1 && self.0 <= peers
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        NodeId(id)
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u32 = s
            .trim()
            .parse()
            .map_err(|_| NodeIdError::Invalid(s.to_string()))?;
        if id == 0 {
            return Err(NodeIdError::Zero);
        }
        Ok(NodeId(id))
    }
}
