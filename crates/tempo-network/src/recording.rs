//! Transport that records instead of delivering

use crate::traits::Transport;
use parking_lot::Mutex;
use tempo_primitives::NodeId;
use tempo_types::Message;

/// One outbound call made through a [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// `send(to, msg)`
    Send(NodeId, Message),
    /// `broadcast(msg)`
    Broadcast(Message),
    /// `multicast_quorum(count, msg)`
    Multicast(usize, Message),
}

impl Outbound {
    /// The message carried by the call
    pub fn message(&self) -> &Message {
        match self {
            Outbound::Send(_, msg) | Outbound::Broadcast(msg) | Outbound::Multicast(_, msg) => msg,
        }
    }
}

/// A [`Transport`] that keeps every outbound call for later inspection.
///
/// Used to drive a single replica by hand.
pub struct RecordingTransport {
    id: NodeId,
    outbound: Mutex<Vec<Outbound>>,
}

impl RecordingTransport {
    /// Create a recorder for replica `id`
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            outbound: Mutex::new(Vec::new()),
        }
    }

    /// Drain the recorded calls
    pub fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.outbound.lock())
    }

    /// Number of calls recorded so far
    pub fn len(&self) -> usize {
        self.outbound.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.outbound.lock().is_empty()
    }
}

impl Transport for RecordingTransport {
    fn id(&self) -> NodeId {
        self.id
    }

    fn send(&self, to: NodeId, msg: Message) {
        self.outbound.lock().push(Outbound::Send(to, msg));
    }

    fn broadcast(&self, msg: Message) {
        self.outbound.lock().push(Outbound::Broadcast(msg));
    }

    fn multicast_quorum(&self, count: usize, msg: Message) {
        self.outbound.lock().push(Outbound::Multicast(count, msg));
    }
}
