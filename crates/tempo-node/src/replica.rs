//! Replica - glues the transport, the transaction pool and the consensus core
//!
//! Inbound messages pass a staleness guard and land in per-kind queues of
//! depth one. The event loop multiplexes those queues, the pacemaker's
//! view-entry stream and the local view timer, and hands every event to its
//! own task so a slow proposal never holds up vote aggregation.

use crate::config::ReplicaConfig;
use crate::error::{NodeError, NodeResult};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempo_consensus::{
    verify_qc, BlockChain, ChainStatus, ConsensusError, Election, HotStuff, Pacemaker, Rotation,
    Safety,
};
use tempo_metrics::{names, timed, Statistics};
use tempo_network::{Envelope, Transport};
use tempo_primitives::{NodeId, View, H256};
use tempo_txpool::{TxPool, TxPoolError};
use tempo_types::{Block, Message, QuorumCert, Tmo, Transaction, TransactionReply, Vote};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Protocol counters kept by the driver itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaCounters {
    /// Blocks proposed by this replica
    pub proposed: u64,
    /// Views entered whose leader simulates Byzantine behavior
    pub byzantine_elections: u64,
    /// Sum of `current view - block view` over committed blocks
    pub delay_rounds: u64,
}

struct Queues {
    block: watch::Sender<Option<Block>>,
    qc: watch::Sender<Option<QuorumCert>>,
    vote: mpsc::Sender<Vote>,
    tmo: mpsc::Sender<Tmo>,
}

struct Receivers {
    block: watch::Receiver<Option<Block>>,
    qc: watch::Receiver<Option<QuorumCert>>,
    vote: mpsc::Receiver<Vote>,
    tmo: mpsc::Receiver<Tmo>,
    views: mpsc::UnboundedReceiver<View>,
}

/// One simulated HotStuff replica
pub struct Replica {
    id: NodeId,
    config: ReplicaConfig,
    election: Arc<dyn Election>,
    safety: Box<dyn Safety>,
    ledger: Arc<BlockChain>,
    pacemaker: Pacemaker,
    pool: TxPool,
    transport: Arc<dyn Transport>,
    stats: Statistics,
    is_started: AtomicBool,
    counters: Mutex<ReplicaCounters>,
    /// Transactions whose reply was already released
    released: Mutex<HashSet<H256>>,
    replies: Option<mpsc::UnboundedSender<TransactionReply>>,
    queues: Queues,
    receivers: Mutex<Option<Receivers>>,
}

impl Replica {
    /// Create a replica in view 0.
    ///
    /// Replies for committed transactions originating here are sent on
    /// `replies` when given.
    pub fn new(
        config: ReplicaConfig,
        transport: Arc<dyn Transport>,
        replies: Option<mpsc::UnboundedSender<TransactionReply>>,
    ) -> NodeResult<Arc<Self>> {
        config.consensus.validate()?;
        let id = config.consensus.node_id;
        if transport.id() != id {
            return Err(NodeError::Config(format!(
                "transport of node {} handed to replica {}",
                transport.id(),
                id
            )));
        }

        let election: Arc<dyn Election> = Arc::new(Rotation::new(config.consensus.peers));
        let ledger = Arc::new(BlockChain::new(&config.consensus));
        let safety: Box<dyn Safety> = Box::new(HotStuff::new(
            Arc::clone(&ledger),
            config.consensus.fork_choice,
        ));
        let pacemaker = Pacemaker::new(
            &config.consensus,
            Arc::clone(&election),
            Arc::clone(&transport),
        );
        let views = pacemaker
            .take_events()
            .ok_or_else(|| NodeError::Config("view events already taken".into()))?;

        let (block_tx, block_rx) = watch::channel(None);
        let (qc_tx, qc_rx) = watch::channel(None);
        let (vote_tx, vote_rx) = mpsc::channel(1);
        let (tmo_tx, tmo_rx) = mpsc::channel(1);

        debug!(
            "[{}] replica created, byzantine={} fork_choice={}",
            id, config.consensus.byzantine, config.consensus.fork_choice
        );

        Ok(Arc::new(Self {
            id,
            election,
            safety,
            ledger,
            pacemaker,
            pool: TxPool::new(config.pool.clone()),
            transport,
            stats: Statistics::new(),
            is_started: AtomicBool::new(false),
            counters: Mutex::new(ReplicaCounters::default()),
            released: Mutex::new(HashSet::new()),
            replies,
            queues: Queues {
                block: block_tx,
                qc: qc_tx,
                vote: vote_tx,
                tmo: tmo_tx,
            },
            receivers: Mutex::new(Some(Receivers {
                block: block_rx,
                qc: qc_rx,
                vote: vote_rx,
                tmo: tmo_rx,
                views,
            })),
            config,
        }))
    }

    /// Identity of this replica
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Whether this replica simulates Byzantine behavior
    pub fn is_byzantine(&self) -> bool {
        self.config.consensus.byzantine
    }

    /// Current view
    pub fn current_view(&self) -> View {
        self.pacemaker.current_view()
    }

    /// Commit statistics of the local ledger
    pub fn chain_status(&self) -> ChainStatus {
        self.safety.chain_status(self.pacemaker.current_view())
    }

    /// Committed block ids in commit order
    pub fn committed_ids(&self) -> Vec<H256> {
        self.ledger.committed_ids()
    }

    /// Local ledger
    pub fn ledger(&self) -> &BlockChain {
        &self.ledger
    }

    /// Local pacemaker
    pub fn pacemaker(&self) -> &Pacemaker {
        &self.pacemaker
    }

    /// Local statistics
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Driver counters
    pub fn counters(&self) -> ReplicaCounters {
        *self.counters.lock()
    }

    /// Run the event loop until `shutdown` turns true.
    ///
    /// `inbox` is drained by a reader task feeding [`Replica::handle_message`].
    pub async fn run(
        self: Arc<Self>,
        mut inbox: mpsc::UnboundedReceiver<Envelope>,
        mut shutdown: watch::Receiver<bool>,
    ) -> NodeResult<()> {
        let mut rx = self
            .receivers
            .lock()
            .take()
            .ok_or(NodeError::AlreadyRunning(self.id))?;

        let reader = {
            let replica = Arc::clone(&self);
            tokio::spawn(async move {
                while let Some(envelope) = inbox.recv().await {
                    replica.handle_message(envelope).await;
                }
            })
        };

        let timeout = self.config.view_timeout;
        let timer = tokio::time::sleep(timeout);
        tokio::pin!(timer);
        let mut timer_view: Option<View> = None;

        info!("[{}] replica running", self.id);

        loop {
            tokio::select! {
                Some(view) = rx.views.recv() => {
                    self.stats.round_time(view);
                    timer.as_mut().reset(tokio::time::Instant::now() + timeout);
                    timer_view = Some(view);
                    let replica = Arc::clone(&self);
                    tokio::spawn(async move { replica.process_new_view(view).await });
                }
                Ok(()) = rx.block.changed() => {
                    let block = rx.block.borrow_and_update().clone();
                    if let Some(block) = block {
                        let replica = Arc::clone(&self);
                        tokio::spawn(async move { replica.process_block(block).await });
                    }
                }
                Ok(()) = rx.qc.changed() => {
                    let qc = rx.qc.borrow_and_update().clone();
                    if let Some(qc) = qc {
                        let replica = Arc::clone(&self);
                        tokio::spawn(async move { replica.process_certificate(&qc) });
                    }
                }
                Some(vote) = rx.vote.recv() => {
                    let replica = Arc::clone(&self);
                    tokio::spawn(async move { replica.process_vote(vote) });
                }
                Some(tmo) = rx.tmo.recv() => {
                    let replica = Arc::clone(&self);
                    tokio::spawn(async move { replica.pacemaker.process_remote_timeout(tmo) });
                }
                () = &mut timer, if timer_view.is_some() => {
                    if let Some(view) = timer_view {
                        if self.pacemaker.current_view() == view {
                            self.pacemaker.timeout_for(view);
                        }
                    }
                    timer.as_mut().reset(tokio::time::Instant::now() + timeout);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[{}] replica stopping at view {}", self.id, self.current_view());
                        break;
                    }
                }
            }
        }

        reader.abort();
        Ok(())
    }

    /// Route one inbound message.
    ///
    /// Protocol messages from views already left are dropped; proposals from
    /// the legitimate leader are archived first so later commits can walk
    /// through them.
    pub async fn handle_message(&self, envelope: Envelope) {
        let Envelope { from, message } = envelope;

        if let Message::Block(block) = &message {
            self.archive(block);
        }
        if let Some(view) = message.view() {
            if let Err(e) = self.pacemaker.ensure_not_stale(view) {
                debug!("[{}] dropping {} from {}: {}", self.id, message.kind(), from, e);
                return;
            }
        }

        match message {
            Message::Block(block) => {
                self.queues.block.send_replace(Some(block));
            }
            Message::Qc(qc) => {
                self.queues.qc.send_replace(Some(qc));
            }
            Message::Vote(vote) => {
                if self.queues.vote.send(vote).await.is_err() {
                    debug!("[{}] vote queue closed", self.id);
                }
            }
            Message::Tmo(tmo) => {
                if self.queues.tmo.send(tmo).await.is_err() {
                    debug!("[{}] timeout queue closed", self.id);
                }
            }
            Message::Tc(tc) => self.pacemaker.handle_tc(tc),
            Message::Transaction(txn) => self.handle_txn(txn),
        }
    }

    /// Buffer a client transaction; the leader of view 1 starts the protocol
    /// on the first one
    pub fn handle_txn(&self, txn: Transaction) {
        self.stats.received();
        match self.pool.collect(txn) {
            Ok(()) => {}
            Err(TxPoolError::AlreadyExists(id)) => {
                debug!("[{}] transaction {} already buffered", self.id, id.short());
            }
            Err(e) => warn!("[{}] transaction dropped: {}", self.id, e),
        }

        if self.election.is_leader(self.id, 1)
            && self
                .is_started
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            info!("[{}] starting the protocol", self.id);
            self.stats.start_signal();
            self.pacemaker.advance_view(0);
        }
    }

    /// Entered `view`: propose if we lead it
    pub async fn process_new_view(&self, view: View) {
        if !self.is_started.swap(true, Ordering::SeqCst) {
            self.stats.start_signal();
        }

        let leader = self.election.leader_for(view);
        if self.config.consensus.is_byzantine_node(leader) {
            self.counters.lock().byzantine_elections += 1;
        }
        if leader != self.id {
            return;
        }
        if self.is_byzantine() {
            warn!("[{}] byzantine replica elected for view {}", self.id, view);
        }
        self.propose_block(view).await;
    }

    async fn propose_block(&self, view: View) {
        let block = timed!(self.stats.metrics(), names::BLOCK_CREATE_MS, {
            let qc = self.safety.forkchoice();
            self.pool.produce_block(view, qc, self.id)
        });
        self.stats.proposed_block(block.size());
        self.counters.lock().proposed += 1;

        simulated_delay(self.config.propose_delay_ms).await;

        info!(
            "[{}] proposing block {} at view {} on {} with {} txns",
            self.id,
            block.id.short(),
            view,
            block.qc.block_id.short(),
            block.size()
        );
        self.transport.broadcast(Message::Block(block.clone()));

        let payload: Vec<H256> = block.payload.iter().map(|txn| txn.id).collect();
        self.process_block(block).await;
        for id in &payload {
            self.pool.remove(id);
        }
    }

    /// Validate a proposal and vote for it if the safety rules allow
    pub async fn process_block(&self, block: Block) {
        let received = Instant::now();
        debug!(
            "[{}] processing block {} of view {} from {}",
            self.id,
            block.id.short(),
            block.view,
            block.proposer
        );

        self.process_certificate(&block.qc);

        // a proposal from the legitimate leader of a later view pulls us into it
        if block.view > self.pacemaker.current_view()
            && self.election.is_leader(block.proposer, block.view)
        {
            self.pacemaker.advance_view(block.view - 1);
        }

        let current = self.pacemaker.current_view();
        if block.view != current {
            debug!(
                "[{}] block of view {} is not for the current view {}",
                self.id, block.view, current
            );
            return;
        }
        if let Err(e) = self.election.verify_leader(block.proposer, block.view) {
            warn!("[{}] rejecting block {}: {}", self.id, block.id.short(), e);
            return;
        }
        if !block.verify_id() {
            warn!("[{}] rejecting block {}: id mismatch", self.id, block.id.short());
            return;
        }
        if let Err(e) = verify_qc(&block.qc, &self.config.consensus) {
            warn!("[{}] rejecting block {}: {}", self.id, block.id.short(), e);
            return;
        }

        self.ledger.add_block(block.clone());

        match self.safety.voting_rule(&block) {
            Ok(true) => {}
            Ok(false) => {
                debug!("[{}] not voting for block {}", self.id, block.id.short());
                return;
            }
            Err(e) => {
                error!("[{}] cannot apply voting rule to {}: {}", self.id, block.id.short(), e);
                return;
            }
        }
        if let Err(e) = self.safety.update_state_by_view(block.view) {
            error!("[{}] cannot record vote at view {}: {}", self.id, block.view, e);
            return;
        }
        self.stats.processed(received.elapsed());

        let vote = Vote::new(block.view, self.id, block.id);
        simulated_delay(self.config.vote_delay_ms).await;

        let aggregator = self.election.leader_for(block.view + 1);
        debug!(
            "[{}] voting for block {} of view {}, sending to {}",
            self.id,
            block.id.short(),
            block.view,
            aggregator
        );
        if aggregator == self.id {
            self.process_vote(vote);
        } else {
            self.transport.send(aggregator, Message::Vote(vote));
        }
        self.stats.voted(received.elapsed());
    }

    /// Tally a vote; a fresh certificate is processed and forwarded to the
    /// leader of the view it opens
    pub fn process_vote(&self, vote: Vote) {
        let qc = match self.ledger.add_vote(vote) {
            Ok(Some(qc)) => qc,
            Ok(None) => return,
            Err(e) => {
                warn!("[{}] discarding vote for view {}: {}", self.id, vote.view, e);
                return;
            }
        };

        self.process_certificate(&qc);

        let leader = self.election.leader_for(self.pacemaker.current_view());
        if leader != self.id {
            debug!("[{}] forwarding certificate of view {} to {}", self.id, qc.view, leader);
            self.transport.send(leader, Message::Qc(qc));
        }
    }

    /// Adopt a quorum certificate, enter the view after it and commit what it
    /// finalizes
    pub fn process_certificate(&self, qc: &QuorumCert) {
        if let Err(e) = verify_qc(qc, &self.config.consensus) {
            warn!("[{}] dropping certificate of view {}: {}", self.id, qc.view, e);
            return;
        }
        if let Err(e) = self.pacemaker.ensure_not_stale(qc.view) {
            debug!("[{}] ignoring certificate: {}", self.id, e);
            return;
        }

        // state is recorded before the view change so the next proposal extends `qc`
        if self.is_byzantine() && self.election.is_leader(self.id, qc.view + 1) {
            self.ledger.update_high_qc(qc.clone());
            self.pacemaker.advance_view(qc.view);
            return;
        }
        let updated = self.safety.update_state_by_qc(qc);
        self.pacemaker.advance_view(qc.view);
        if let Err(e) = updated {
            error!("[{}] cannot adopt certificate of view {}: {}", self.id, qc.view, e);
            return;
        }

        if qc.view < self.config.consensus.min_commit_view {
            return;
        }

        let target = match self.safety.commit_rule(qc) {
            Ok(Some(block)) => block,
            Ok(None) => return,
            Err(e) => {
                error!("[{}] cannot apply commit rule at view {}: {}", self.id, qc.view, e);
                return;
            }
        };

        match self.ledger.commit_block(&target.id) {
            Ok(committed) => self.process_committed_blocks(committed),
            Err(e @ ConsensusError::ConflictingBranch(_)) => {
                warn!("[{}] refusing commit: {}", self.id, e);
            }
            Err(e) => error!("[{}] commit failed: {}", self.id, e),
        }
    }

    fn process_committed_blocks(&self, blocks: Vec<Block>) {
        let current = self.pacemaker.current_view();
        for block in blocks {
            self.counters.lock().delay_rounds += current.saturating_sub(block.view);

            for txn in &block.payload {
                self.pool.remove(&txn.id);
                if txn.origin == self.id && self.released.lock().insert(txn.id) {
                    self.release(txn, &block);
                }
            }
            self.stats.add_committed_txns(block.size());
            debug!(
                "[{}] block {} of view {} committed with {} txns",
                self.id,
                block.id.short(),
                block.view,
                block.size()
            );
        }
    }

    fn release(&self, txn: &Transaction, block: &Block) {
        let latency_ms = txn.age_ms();
        self.stats.add_latency(Duration::from_millis(latency_ms));
        let Some(replies) = &self.replies else {
            return;
        };
        let reply = TransactionReply {
            txn_id: txn.id,
            origin: self.id,
            block_id: block.id,
            view: block.view,
            latency_ms,
        };
        if replies.send(reply).is_err() {
            debug!("[{}] reply channel closed", self.id);
        }
    }

    fn archive(&self, block: &Block) {
        if self.election.is_leader(block.proposer, block.view) && block.verify_id() {
            self.ledger.add_block(block.clone());
        }
    }
}

async fn simulated_delay(max_ms: u64) {
    if max_ms == 0 {
        return;
    }
    let ms = rand::thread_rng().gen_range(0..=max_ms);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
