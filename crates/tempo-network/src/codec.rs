//! Wire encoding of protocol messages

use crate::error::{NetworkError, NetworkResult};
use tempo_types::Message;

/// Encode a message as JSON bytes
pub fn encode_message(msg: &Message) -> NetworkResult<Vec<u8>> {
    serde_json::to_vec(msg).map_err(|e| NetworkError::Codec(e.to_string()))
}

/// Decode a message from JSON bytes
pub fn decode_message(data: &[u8]) -> NetworkResult<Message> {
    serde_json::from_slice(data).map_err(|e| NetworkError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_primitives::{NodeId, H256};
    use tempo_types::{Block, QuorumCert, Vote};

    #[test]
    fn test_block_survives_encoding() {
        let genesis = Block::genesis();
        let block = Block::new(1, NodeId::new(1), QuorumCert::genesis(genesis.id), vec![]);
        let data = encode_message(&Message::Block(block.clone())).unwrap();
        match decode_message(&data).unwrap() {
            Message::Block(decoded) => {
                assert_eq!(decoded, block);
                assert!(decoded.verify_id());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_message(b"not json");
        assert!(matches!(result, Err(NetworkError::Codec(_))));
    }

    #[test]
    fn test_vote_encoding_is_compact_json() {
        let vote = Message::Vote(Vote::new(2, NodeId::new(3), H256::ZERO));
        let data = encode_message(&vote).unwrap();
        let text = String::from_utf8(data).unwrap();
        assert!(text.starts_with("{\"Vote\""));
    }
}
