//! Transaction pool error types

use tempo_primitives::H256;
use thiserror::Error;

/// Transaction pool errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxPoolError {
    /// Transaction already exists
    #[error("transaction already exists: {0:?}")]
    AlreadyExists(H256),

    /// Pool is full
    #[error("pool is full (max size: {0})")]
    PoolFull(usize),
}

/// Result type for transaction pool operations
pub type TxPoolResult<T> = Result<T, TxPoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TxPoolError::PoolFull(10);
        assert_eq!(err.to_string(), "pool is full (max size: 10)");
        let err = TxPoolError::AlreadyExists(H256::ZERO);
        assert!(err.to_string().contains("already exists"));
    }
}
