//! View synchronization through timeout certificates

use crate::config::ConsensusConfig;
use crate::election::Election;
use crate::error::{ConsensusError, ConsensusResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempo_network::Transport;
use tempo_primitives::{NodeId, View};
use tempo_types::{Message, TimeoutCert, Tmo};
use tokio::sync::mpsc;
use tracing::{debug, info};

struct PacemakerState {
    cur_view: View,
    timeouts: HashMap<View, HashSet<NodeId>>,
    high_tc: TimeoutCert,
    last_view_time: Instant,
    view_durations: BTreeMap<View, Duration>,
}

/// Owns the current view of one replica.
///
/// Every view transition goes through [`Pacemaker::advance_view`], which emits
/// the entered view on the stream returned by [`Pacemaker::take_events`].
/// Events are sent after the state lock is released.
pub struct Pacemaker {
    id: NodeId,
    peers: u32,
    threshold: usize,
    byzantine: bool,
    fault_bound: usize,
    election: Arc<dyn Election>,
    transport: Arc<dyn Transport>,
    state: Mutex<PacemakerState>,
    events_tx: mpsc::UnboundedSender<View>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<View>>>,
}

impl Pacemaker {
    /// Create a pacemaker in view 0
    pub fn new(
        config: &ConsensusConfig,
        election: Arc<dyn Election>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            id: config.node_id,
            peers: config.peers,
            threshold: config.quorum_threshold(),
            byzantine: config.byzantine,
            fault_bound: config.fault_bound as usize,
            election,
            transport,
            state: Mutex::new(PacemakerState {
                cur_view: 0,
                timeouts: HashMap::new(),
                high_tc: TimeoutCert::default(),
                last_view_time: Instant::now(),
                view_durations: BTreeMap::new(),
            }),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Take the view-entry stream; only the first call gets it
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<View>> {
        self.events_rx.lock().take()
    }

    /// Current view
    pub fn current_view(&self) -> View {
        self.state.lock().cur_view
    }

    /// Highest timeout certificate observed
    pub fn high_tc(&self) -> TimeoutCert {
        self.state.lock().high_tc
    }

    /// Time spent in each view that has been left
    pub fn view_durations(&self) -> BTreeMap<View, Duration> {
        self.state.lock().view_durations.clone()
    }

    /// Fail with [`ConsensusError::StaleView`] if `view` is behind the current view
    pub fn ensure_not_stale(&self, view: View) -> ConsensusResult<()> {
        let current = self.current_view();
        if view < current {
            Err(ConsensusError::StaleView { view, current })
        } else {
            Ok(())
        }
    }

    /// Move past `view` into `view + 1`; a no-op for views already left
    pub fn advance_view(&self, view: View) {
        {
            let mut state = self.state.lock();
            if view < state.cur_view {
                return;
            }
            let now = Instant::now();
            let lasted = now.duration_since(state.last_view_time);
            let left = state.cur_view;
            state.view_durations.insert(left, lasted);
            state.cur_view = view + 1;
            state.last_view_time = now;
            state.timeouts.retain(|v, _| *v > view);
        }
        debug!("[{}] entering view {}", self.id, view + 1);
        // the receiver lives as long as the replica
        let _ = self.events_tx.send(view + 1);
    }

    /// Record a timeout endorsement from another replica (or ourselves)
    pub fn process_remote_timeout(&self, tmo: Tmo) {
        if !tmo.node_id.is_member_of(self.peers) {
            debug!("[{}] ignoring timeout from non-participant {}", self.id, tmo.node_id);
            return;
        }

        let certified = {
            let mut state = self.state.lock();
            if tmo.view < state.cur_view {
                return;
            }
            let endorsers = state.timeouts.entry(tmo.view).or_default();
            endorsers.insert(tmo.node_id) && endorsers.len() == self.threshold
        };

        if certified {
            info!("[{}] timeout certificate for view {} formed", self.id, tmo.view);
            let leader = self.election.leader_for(tmo.view);
            self.transport
                .send(leader, Message::Tc(TimeoutCert::new(tmo.view)));
            self.advance_view(tmo.view);
            return;
        }

        if tmo.high_tc.view >= self.current_view() {
            self.advance_view(tmo.high_tc.view);
        }
    }

    /// Called when the local timer for `view` fires
    pub fn timeout_for(&self, view: View) {
        let tmo = Tmo {
            view,
            node_id: self.id,
            high_tc: TimeoutCert::new(view.saturating_sub(1)),
        };
        debug!("[{}] timed out in view {}", self.id, view);
        if self.byzantine {
            self.transport
                .multicast_quorum(self.fault_bound, Message::Tmo(tmo));
            return;
        }
        self.transport.broadcast(Message::Tmo(tmo));
        self.process_remote_timeout(tmo);
    }

    /// Adopt a timeout certificate
    pub fn handle_tc(&self, tc: TimeoutCert) {
        {
            let mut state = self.state.lock();
            if tc.view < state.cur_view {
                return;
            }
            if tc.view > state.high_tc.view {
                state.high_tc = tc;
            }
        }
        self.advance_view(tc.view);
    }
}
