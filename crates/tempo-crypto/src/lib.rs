//! # tempo-crypto
//!
//! Hashing primitives for tempo.
//!
//! - Keccak-256 hashing
//! - Incremental hashing of structured fields
//!
//! Votes, blocks and certificates are not signed: authentication is outside
//! the simulated trust model, so this crate only derives content identifiers.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod hash;

pub use hash::{keccak256, ContentHasher};
