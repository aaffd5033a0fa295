//! Whole-cluster runs over the in-memory network

use std::sync::Arc;
use std::time::Duration;
use tempo_network::{NetworkConfig, SimNetwork, Transport};
use tempo_node::{Replica, SimConfig, Simulation};
use tempo_primitives::NodeId;
use tempo_types::Message;
use tokio::sync::watch;

fn fast_config() -> SimConfig {
    SimConfig {
        network_delay_ms: 2,
        vote_delay_ms: 3,
        propose_delay_ms: 3,
        txn_interval_ms: 5,
        view_timeout_ms: 300,
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_honest_cluster_commits() {
    let simulation = Simulation::new(fast_config()).unwrap();
    let report = simulation.run_for(Duration::from_secs(2)).await.unwrap();

    assert!(report.check_commit_safety());
    assert!(report.submitted > 0);
    assert!(report.replies > 0);
    assert!(report.messages_delivered > 0);
    for replica in &report.replicas {
        assert!(replica.chain.committed > 0, "replica {} committed nothing", replica.id);
        assert!(replica.view > 4);
        assert_eq!(replica.chain.chain_quality, 1.0);
        assert!(replica.stats.committed_txns > 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_forking_leader_cannot_break_safety() {
    let config = SimConfig {
        byzantine_count: 1,
        ..fast_config()
    };
    let simulation = Simulation::new(config).unwrap();
    let report = simulation.run_for(Duration::from_secs(2)).await.unwrap();

    assert!(report.check_commit_safety());
    assert!(report.min_honest_committed() > 0);

    let byzantine: Vec<_> = report.replicas.iter().filter(|r| r.byzantine).collect();
    assert_eq!(byzantine.len(), 1);
    assert_eq!(byzantine[0].id, NodeId::new(1));
    for replica in report.replicas.iter().filter(|r| !r.byzantine) {
        assert!(replica.counters.byzantine_elections > 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_default_rules_cluster_commits() {
    let config = SimConfig {
        peers: 7,
        fault_bound: 2,
        algorithm: "default".into(),
        ..fast_config()
    };
    let simulation = Simulation::new(config).unwrap();
    let report = simulation.run_for(Duration::from_secs(2)).await.unwrap();

    assert_eq!(report.replicas.len(), 7);
    assert!(report.check_commit_safety());
    assert!(report.min_honest_committed() > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_silent_replicas_are_timed_out() {
    // node 2 never runs, so view 2 has no proposal and must time out
    let network = SimNetwork::new(NetworkConfig::default());
    let config = SimConfig {
        view_timeout_ms: 100,
        vote_delay_ms: 0,
        propose_delay_ms: 0,
        ..Default::default()
    };
    let (shutdown_tx, shutdown) = watch::channel(false);

    let mut replicas = Vec::new();
    let mut handles = Vec::new();
    for id in config.node_ids() {
        let (transport, inbox) = network.register(id).unwrap();
        let replica = Replica::new(config.replica_config(id), Arc::new(transport), None).unwrap();
        if id != NodeId::new(2) {
            handles.push(tokio::spawn(Arc::clone(&replica).run(inbox, shutdown.clone())));
        }
        replicas.push(replica);
    }

    let client = tempo_types::Transaction::new(NodeId::new(1), 0, bytes::Bytes::from("cmd"));
    for replica in &replicas {
        replica.handle_txn(client.clone());
    }

    tokio::time::sleep(Duration::from_millis(800)).await;
    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for replica in replicas.iter().filter(|r| r.id() != NodeId::new(2)) {
        assert!(
            replica.current_view() > 2,
            "replica {} stuck at view {}",
            replica.id(),
            replica.current_view()
        );
        assert!(!replica.pacemaker().view_durations().is_empty());
    }
}

#[tokio::test]
async fn test_transport_routes_between_registered_replicas() {
    let network = SimNetwork::new(NetworkConfig::default());
    let (t1, _rx1) = network.register(NodeId::new(1)).unwrap();
    let (_t2, mut rx2) = network.register(NodeId::new(2)).unwrap();

    t1.broadcast(Message::Tc(tempo_types::TimeoutCert::new(3)));
    let envelope = rx2.recv().await.unwrap();
    assert_eq!(envelope.from, NodeId::new(1));
    assert_eq!(envelope.message.view(), Some(3));
}
