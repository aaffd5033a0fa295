//! Transport contract used by the consensus core

use tempo_primitives::NodeId;
use tempo_types::Message;

/// Outbound side of a replica's network connection.
///
/// All operations are fire-and-forget: delivery failures are logged by the
/// implementation and never surface to the protocol.
pub trait Transport: Send + Sync {
    /// Identity of the local replica
    fn id(&self) -> NodeId;

    /// Send a message to one replica
    fn send(&self, to: NodeId, msg: Message);

    /// Send a message to every other replica
    fn broadcast(&self, msg: Message);

    /// Send a message to `count` arbitrary other replicas
    fn multicast_quorum(&self, count: usize, msg: Message);
}
