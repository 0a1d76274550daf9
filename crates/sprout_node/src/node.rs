//! Node: top-level coordinator.
//!
//! [`Node`] binds the listening port, creates the node's identity for the
//! port actually bound, and runs two background tasks over one shared
//! state:
//! - the node server (inbound requests)
//! - the growth scheduler (learning, discovery, sharing, replication)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::identity::{NodeId, NodeIdentity};
use crate::replication::{LoggingLauncher, ReplicationGate, ReplicationLauncher};
use crate::scheduler::GrowthScheduler;
use crate::server::NodeServer;
use crate::state::{NodeState, SharedState};
use crate::transport::FrameLimits;

/// A running node. Dropping it without [`stop`](Node::stop) leaves the
/// background tasks running until the runtime shuts down.
pub struct Node {
    state: SharedState,
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    server: JoinHandle<()>,
    scheduler: JoinHandle<()>,
}

impl Node {
    /// Start a node that logs replication intent instead of launching.
    pub async fn start(config: NodeConfig) -> Result<Self, NodeError> {
        Self::start_with_launcher(config, Arc::new(LoggingLauncher)).await
    }

    /// Start a node with a custom replication launcher.
    ///
    /// Fails only if the listening port cannot be bound.
    pub async fn start_with_launcher(
        config: NodeConfig,
        launcher: Arc<dyn ReplicationLauncher>,
    ) -> Result<Self, NodeError> {
        let server = NodeServer::bind(&config.listen_host, config.port).await?;
        let local_addr = server.local_addr();

        let identity = NodeIdentity::generate(local_addr.port());
        let state = NodeState::shared(identity, &config);
        info!(node = %state.node_id(), "Node starting on {local_addr}");

        let (shutdown_tx, _) = broadcast::channel(4);

        let server = tokio::spawn(server.run(
            state.clone(),
            FrameLimits::inbound(&config),
            shutdown_tx.subscribe(),
        ));

        let gate = ReplicationGate::from_config(&config, launcher);
        let scheduler = GrowthScheduler::new(state.clone(), config, gate);
        let scheduler = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

        Ok(Self {
            state,
            local_addr,
            shutdown_tx,
            server,
            scheduler,
        })
    }

    pub fn id(&self) -> &NodeId {
        self.state.node_id()
    }

    pub fn identity(&self) -> &NodeIdentity {
        self.state.identity()
    }

    /// Shared state, for inspection.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal both tasks and wait for them. The scheduler finishes any cycle
    /// in progress; the server drains open connections.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());

        if let Err(e) = self.scheduler.await {
            warn!("Scheduler task ended abnormally: {e}");
        }
        if let Err(e) = self.server.await {
            warn!("Server task ended abnormally: {e}");
        }

        info!(
            node = %self.state.node_id(),
            survival = %self.state.survival(),
            knowledge = self.state.knowledge_count(),
            peers = self.state.peer_count(),
            "Node stopped"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::message::Message;
    use crate::transport;

    fn local_config() -> NodeConfig {
        NodeConfig {
            listen_host: "127.0.0.1".into(),
            port: 0,
            discovery_host: "127.0.0.1".into(),
            discovery_ports: Vec::new(),
            startup_delay: Duration::from_secs(3600),
            ..NodeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_identity_uses_bound_port() {
        let node = Node::start(local_config()).await.unwrap();
        let port = node.local_addr().port();
        assert_ne!(port, 0);
        assert_eq!(node.identity().port, port);
        assert!(node.id().as_str().starts_with(&format!("NODE_{port}_")));
        node.stop().await;
    }

    #[tokio::test]
    async fn test_answers_ping_and_stops() {
        let node = Node::start(local_config()).await.unwrap();
        let port = node.local_addr().port();

        let limits = FrameLimits {
            timeout: Duration::from_secs(2),
            max_frame_bytes: 64 * 1024,
        };
        let response = transport::request("127.0.0.1", port, &Message::Ping, limits)
            .await
            .unwrap();
        assert_eq!(
            response,
            Message::Pong {
                node_id: node.id().clone(),
                knowledge_count: 0,
            }
        );

        tokio::time::timeout(Duration::from_secs(5), node.stop())
            .await
            .expect("node stops promptly");
    }

    #[tokio::test]
    async fn test_start_fails_when_port_taken() {
        let first = Node::start(local_config()).await.unwrap();
        let mut config = local_config();
        config.port = first.local_addr().port();

        match Node::start(config).await {
            Err(NodeError::BindUnavailable { .. }) => {}
            Err(other) => panic!("Expected BindUnavailable, got {other:?}"),
            Ok(_) => panic!("Second node should not bind a taken port"),
        }
        first.stop().await;
    }
}
