//! In-memory simulated network

use crate::codec::{decode_message, encode_message};
use crate::error::{NetworkError, NetworkResult};
use crate::traits::Transport;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempo_primitives::NodeId;
use tempo_types::Message;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Simulated network configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Lower bound of per-message delivery delay (ms)
    pub min_delay_ms: u64,
    /// Upper bound of per-message delivery delay (ms)
    pub max_delay_ms: u64,
    /// Round-trip every message through the wire codec
    pub wire_codec: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            wire_codec: true,
        }
    }
}

/// A delivered message together with its sender
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Sending replica
    pub from: NodeId,
    /// Payload
    pub message: Message,
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficStats {
    /// Messages handed to an inbox
    pub delivered: u64,
    /// Messages lost (unknown peer, closed inbox, codec failure)
    pub dropped: u64,
    /// Encoded bytes routed (only counted with the wire codec enabled)
    pub bytes: u64,
}

struct Inner {
    config: NetworkConfig,
    peers: RwLock<BTreeMap<NodeId, mpsc::UnboundedSender<Envelope>>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
    bytes: AtomicU64,
}

/// Routing table connecting every registered replica
#[derive(Clone)]
pub struct SimNetwork {
    inner: Arc<Inner>,
}

impl SimNetwork {
    /// Create an empty network
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                peers: RwLock::new(BTreeMap::new()),
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                bytes: AtomicU64::new(0),
            }),
        }
    }

    /// Attach a replica, returning its transport and inbox
    pub fn register(
        &self,
        id: NodeId,
    ) -> NetworkResult<(SimTransport, mpsc::UnboundedReceiver<Envelope>)> {
        let mut peers = self.inner.peers.write();
        if peers.contains_key(&id) {
            return Err(NetworkError::AlreadyRegistered(id));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        peers.insert(id, tx);
        debug!("[{}] registered with the simulated network", id);
        Ok((
            SimTransport {
                id,
                network: self.clone(),
            },
            rx,
        ))
    }

    /// Detach a replica; messages to it are dropped afterwards
    pub fn unregister(&self, id: NodeId) {
        self.inner.peers.write().remove(&id);
    }

    /// Registered identities in ascending order
    pub fn peer_ids(&self) -> Vec<NodeId> {
        self.inner.peers.read().keys().copied().collect()
    }

    /// Delivery counters so far
    pub fn stats(&self) -> TrafficStats {
        TrafficStats {
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            bytes: self.inner.bytes.load(Ordering::Relaxed),
        }
    }

    fn route(&self, from: NodeId, to: NodeId, msg: Message) {
        let msg = if self.inner.config.wire_codec {
            match self.over_the_wire(&msg) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("[{}] cannot encode {} for {}: {}", from, msg.kind(), to, e);
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        } else {
            msg
        };

        let sender = match self.inner.peers.read().get(&to) {
            Some(sender) => sender.clone(),
            None => {
                debug!("[{}] dropping {} to unknown peer {}", from, msg.kind(), to);
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let envelope = Envelope { from, message: msg };
        let delay = self.sample_delay();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if !delay.is_zero() => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    deliver(&inner, to, &sender, envelope);
                });
            }
            _ => deliver(&self.inner, to, &sender, envelope),
        }
    }

    fn over_the_wire(&self, msg: &Message) -> NetworkResult<Message> {
        let data = encode_message(msg)?;
        self.inner
            .bytes
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        decode_message(&data)
    }

    fn sample_delay(&self) -> Duration {
        let (min, max) = (self.inner.config.min_delay_ms, self.inner.config.max_delay_ms);
        if max == 0 || max < min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

fn deliver(
    inner: &Inner,
    to: NodeId,
    sender: &mpsc::UnboundedSender<Envelope>,
    envelope: Envelope,
) {
    if sender.send(envelope).is_err() {
        debug!("inbox of {} is closed", to);
        inner.dropped.fetch_add(1, Ordering::Relaxed);
    } else {
        inner.delivered.fetch_add(1, Ordering::Relaxed);
    }
}

/// A replica's handle onto the [`SimNetwork`]
#[derive(Clone)]
pub struct SimTransport {
    id: NodeId,
    network: SimNetwork,
}

impl SimTransport {
    fn others(&self) -> Vec<NodeId> {
        self.network
            .peer_ids()
            .into_iter()
            .filter(|peer| *peer != self.id)
            .collect()
    }
}

impl Transport for SimTransport {
    fn id(&self) -> NodeId {
        self.id
    }

    fn send(&self, to: NodeId, msg: Message) {
        self.network.route(self.id, to, msg);
    }

    fn broadcast(&self, msg: Message) {
        for peer in self.others() {
            self.network.route(self.id, peer, msg.clone());
        }
    }

    fn multicast_quorum(&self, count: usize, msg: Message) {
        let targets: Vec<NodeId> = {
            let others = self.others();
            let mut rng = rand::thread_rng();
            others.choose_multiple(&mut rng, count).copied().collect()
        };
        for peer in targets {
            self.network.route(self.id, peer, msg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_primitives::H256;
    use tempo_types::{TimeoutCert, Vote};

    fn vote() -> Message {
        Message::Vote(Vote::new(1, NodeId::new(1), H256::ZERO))
    }

    #[tokio::test]
    async fn test_send_reaches_target_only() {
        let network = SimNetwork::new(NetworkConfig::default());
        let (t1, _rx1) = network.register(NodeId::new(1)).unwrap();
        let (_t2, mut rx2) = network.register(NodeId::new(2)).unwrap();
        let (_t3, mut rx3) = network.register(NodeId::new(3)).unwrap();

        t1.send(NodeId::new(2), vote());

        let env = rx2.recv().await.unwrap();
        assert_eq!(env.from, NodeId::new(1));
        assert_eq!(env.message, vote());
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let network = SimNetwork::new(NetworkConfig::default());
        let (t1, mut rx1) = network.register(NodeId::new(1)).unwrap();
        let (_t2, mut rx2) = network.register(NodeId::new(2)).unwrap();
        let (_t3, mut rx3) = network.register(NodeId::new(3)).unwrap();

        t1.broadcast(Message::Tc(TimeoutCert::new(4)));

        assert!(rx2.recv().await.is_some());
        assert!(rx3.recv().await.is_some());
        assert!(rx1.try_recv().is_err());
        assert_eq!(network.stats().delivered, 2);
    }

    #[tokio::test]
    async fn test_multicast_quorum_reaches_exactly_count_peers() {
        let network = SimNetwork::new(NetworkConfig::default());
        let (t1, _rx1) = network.register(NodeId::new(1)).unwrap();
        let mut inboxes = Vec::new();
        for i in 2..=4 {
            let (_t, rx) = network.register(NodeId::new(i)).unwrap();
            inboxes.push(rx);
        }

        t1.multicast_quorum(1, vote());

        let received = inboxes.iter_mut().map(|rx| rx.try_recv().is_ok()).filter(|ok| *ok).count();
        assert_eq!(received, 1);
    }

    #[tokio::test]
    async fn test_unknown_peer_is_dropped() {
        let network = SimNetwork::new(NetworkConfig::default());
        let (t1, _rx1) = network.register(NodeId::new(1)).unwrap();
        t1.send(NodeId::new(9), vote());
        assert_eq!(network.stats().dropped, 1);
        assert_eq!(network.stats().delivered, 0);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let network = SimNetwork::new(NetworkConfig::default());
        let _first = network.register(NodeId::new(1)).unwrap();
        let second = network.register(NodeId::new(1));
        assert!(matches!(second, Err(NetworkError::AlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn test_wire_codec_counts_bytes() {
        let network = SimNetwork::new(NetworkConfig::default());
        let (t1, _rx1) = network.register(NodeId::new(1)).unwrap();
        let (_t2, mut rx2) = network.register(NodeId::new(2)).unwrap();
        t1.send(NodeId::new(2), vote());
        rx2.recv().await.unwrap();
        assert!(network.stats().bytes > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_delivery() {
        let network = SimNetwork::new(NetworkConfig {
            min_delay_ms: 50,
            max_delay_ms: 50,
            wire_codec: false,
        });
        let (t1, _rx1) = network.register(NodeId::new(1)).unwrap();
        let (_t2, mut rx2) = network.register(NodeId::new(2)).unwrap();

        t1.send(NodeId::new(2), vote());
        assert!(rx2.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx2.recv().await.is_some());
        assert_eq!(network.stats().bytes, 0);
    }

    #[tokio::test]
    async fn test_unregister_drops_later_messages() {
        let network = SimNetwork::new(NetworkConfig::default());
        let (t1, _rx1) = network.register(NodeId::new(1)).unwrap();
        let (_t2, _rx2) = network.register(NodeId::new(2)).unwrap();
        network.unregister(NodeId::new(2));
        assert_eq!(network.peer_ids(), vec![NodeId::new(1)]);
        t1.send(NodeId::new(2), vote());
        assert_eq!(network.stats().dropped, 1);
    }
}
