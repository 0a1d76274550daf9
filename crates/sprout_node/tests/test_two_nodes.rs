use std::time::Duration;

use sprout_node::message::Message;
use sprout_node::sync::{dial_peer, share_knowledge};
use sprout_node::transport::{self, FrameLimits};
use sprout_node::{KnowledgeItem, Node, NodeConfig};

/// A node on an ephemeral loopback port whose scheduler stays idle.
fn quiet_config() -> NodeConfig {
    NodeConfig {
        listen_host: "127.0.0.1".into(),
        port: 0,
        discovery_host: "127.0.0.1".into(),
        discovery_ports: Vec::new(),
        startup_delay: Duration::from_secs(3600),
        ..NodeConfig::default()
    }
}

fn limits() -> FrameLimits {
    FrameLimits {
        timeout: Duration::from_secs(2),
        max_frame_bytes: 64 * 1024,
    }
}

#[tokio::test]
async fn dialer_records_dialed_node_but_not_the_reverse() {
    let a = Node::start(quiet_config()).await.unwrap();
    let b = Node::start(quiet_config()).await.unwrap();
    let b_port = b.local_addr().port();

    assert!(dial_peer(a.state(), "127.0.0.1", b_port, limits()).await);

    let a_peers = a.state().peers_snapshot();
    assert_eq!(a_peers.len(), 1);
    assert_eq!(&a_peers[0].id, b.id());
    assert_eq!(a_peers[0].host, "127.0.0.1");
    assert_eq!(a_peers[0].port, b_port);

    assert_eq!(b.state().peer_count(), 0);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn learn_into_store_of_three_acks_two() {
    let node = Node::start(quiet_config()).await.unwrap();
    let port = node.local_addr().port();
    let origin = node.id().clone();
    node.state().merge_knowledge(vec![
        KnowledgeItem::new("Distributed Systems", origin.clone(), 3),
        KnowledgeItem::new("Network Security", origin.clone(), 6),
        KnowledgeItem::new("Cloud Computing", origin, 9),
    ]);

    let sender = sprout_node::NodeId::from_string("NODE_1_1000");
    let request = Message::Learn {
        node_id: sender.clone(),
        knowledge: vec![
            KnowledgeItem::new("Machine Learning", sender.clone(), 2),
            KnowledgeItem::new("AI Ethics", sender, 5),
        ],
    };
    let response = transport::request("127.0.0.1", port, &request, limits())
        .await
        .unwrap();

    assert_eq!(response, Message::LearnAck { received_count: 2 });
    assert_eq!(node.state().knowledge_count(), 5);
    assert_eq!(node.state().peer_count(), 0);

    node.stop().await;
}

#[tokio::test]
async fn sync_then_share_moves_knowledge_both_ways() {
    let a = Node::start(quiet_config()).await.unwrap();
    let b = Node::start(quiet_config()).await.unwrap();
    let b_port = b.local_addr().port();

    b.state()
        .merge_knowledge(vec![KnowledgeItem::new("Cryptography", b.id().clone(), 7)]);
    a.state()
        .merge_knowledge(vec![KnowledgeItem::new("Data Analysis", a.id().clone(), 4)]);

    assert!(dial_peer(a.state(), "127.0.0.1", b_port, limits()).await);
    // A now holds its own item plus B's.
    assert_eq!(a.state().knowledge_count(), 2);

    // Sharing pushes A's last items (including B's copy) back to B.
    assert_eq!(share_knowledge(a.state(), limits()).await, 1);
    assert_eq!(b.state().knowledge_count(), 3);

    a.stop().await;
    b.stop().await;
}
