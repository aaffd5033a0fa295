//! Network error types

use tempo_primitives::NodeId;
use thiserror::Error;

/// Network errors
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Destination is not registered
    #[error("unknown peer: {0}")]
    UnknownPeer(NodeId),

    /// Identity registered twice
    #[error("peer already registered: {0}")]
    AlreadyRegistered(NodeId),

    /// Destination inbox was dropped
    #[error("channel closed for peer {0}")]
    ChannelClosed(NodeId),

    /// Message could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),
}

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unknown_peer() {
        let err = NetworkError::UnknownPeer(NodeId::new(7));
        assert_eq!(err.to_string(), "unknown peer: 7");
    }

    #[test]
    fn test_error_display_codec() {
        let err = NetworkError::Codec("eof".to_string());
        assert!(err.to_string().contains("eof"));
    }
}
