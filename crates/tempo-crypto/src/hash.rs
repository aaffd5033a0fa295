//! Keccak-256 hashing

use sha3::{Digest, Keccak256};
use tempo_primitives::H256;

/// Compute Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    H256::from_bytes(result.into())
}

/// Builder that feeds typed fields into a Keccak-256 state.
///
/// Integers are written little-endian, byte strings are length-prefixed so
/// that adjacent fields cannot be confused with one another.
#[derive(Default)]
pub struct ContentHasher {
    inner: Keccak256,
}

impl ContentHasher {
    /// Create an empty hasher
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `u64`
    pub fn u64(mut self, value: u64) -> Self {
        self.inner.update(value.to_le_bytes());
        self
    }

    /// Append a `u32`
    pub fn u32(mut self, value: u32) -> Self {
        self.inner.update(value.to_le_bytes());
        self
    }

    /// Append a hash
    pub fn hash(mut self, value: &H256) -> Self {
        self.inner.update(value.as_bytes());
        self
    }

    /// Append a length-prefixed byte string
    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.inner.update((value.len() as u64).to_le_bytes());
        self.inner.update(value);
        self
    }

    /// Finish and return the digest
    pub fn finish(self) -> H256 {
        H256::from_bytes(self.inner.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        // keccak256("") = 0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470
        let hash = keccak256(&[]);
        assert_eq!(
            hash.to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_hello() {
        let hash = keccak256(b"hello");
        assert_eq!(
            hash.to_hex(),
            "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_content_hasher_matches_concatenation() {
        let expected = {
            let mut buf = Vec::new();
            buf.extend_from_slice(&5u64.to_le_bytes());
            buf.extend_from_slice(&2u32.to_le_bytes());
            keccak256(&buf)
        };
        let got = ContentHasher::new().u64(5).u32(2).finish();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_content_hasher_length_prefix_separates_fields() {
        let a = ContentHasher::new().bytes(b"ab").bytes(b"c").finish();
        let b = ContentHasher::new().bytes(b"a").bytes(b"bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_content_hasher_deterministic() {
        let h = H256::from_bytes([9u8; 32]);
        let a = ContentHasher::new().hash(&h).u64(1).finish();
        let b = ContentHasher::new().hash(&h).u64(1).finish();
        assert_eq!(a, b);
    }
}
