//! Replication gate: decides whether the node should spawn a copy of
//! itself, and where.
//!
//! Starting the copy is not this crate's business. A [`ReplicationLauncher`]
//! receives the chosen port; the shipped [`LoggingLauncher`] only records
//! the intent.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{NodeConfig, PortRange};
use crate::error::NodeError;
use crate::state::{NodeState, SurvivalLevel};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Starts a new node instance on a port.
pub trait ReplicationLauncher: Send + Sync {
    /// Try to launch on `port`. Returns whether the launch went ahead.
    fn launch(&self, port: u16) -> bool;
}

/// Launcher that logs and reports success without starting anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingLauncher;

impl ReplicationLauncher for LoggingLauncher {
    fn launch(&self, port: u16) -> bool {
        info!(port, "Replicating to port {port}");
        true
    }
}

/// Checks whether a port is free to bind. May block; the gate calls it
/// off the async workers.
pub trait PortProbe: Send + Sync {
    fn probe(&self, port: u16) -> Result<(), NodeError>;
}

/// Probe that binds a TCP listener on `host` and releases it immediately.
#[derive(Debug, Clone)]
pub struct TcpPortProbe {
    host: String,
}

impl TcpPortProbe {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl PortProbe for TcpPortProbe {
    fn probe(&self, port: u16) -> Result<(), NodeError> {
        std::net::TcpListener::bind((self.host.as_str(), port))
            .map(drop)
            .map_err(|e| NodeError::BindUnavailable {
                port,
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

pub struct ReplicationGate {
    min_survival: SurvivalLevel,
    max_peers: usize,
    ports: PortRange,
    probe: Arc<dyn PortProbe>,
    launcher: Arc<dyn ReplicationLauncher>,
}

impl ReplicationGate {
    pub fn new(
        config: &NodeConfig,
        probe: Arc<dyn PortProbe>,
        launcher: Arc<dyn ReplicationLauncher>,
    ) -> Self {
        Self {
            min_survival: SurvivalLevel::from_f64(config.replication_min_survival),
            max_peers: config.replication_max_peers,
            ports: config.replication_ports,
            probe,
            launcher,
        }
    }

    /// Gate probing `config.discovery_host`, the host peers are reached on.
    pub fn from_config(config: &NodeConfig, launcher: Arc<dyn ReplicationLauncher>) -> Self {
        Self::new(
            config,
            Arc::new(TcpPortProbe::new(config.discovery_host.clone())),
            launcher,
        )
    }

    /// Replicate only when fit enough and not yet well connected.
    pub fn should_replicate(&self, survival: SurvivalLevel, peer_count: usize) -> bool {
        survival >= self.min_survival && peer_count < self.max_peers
    }

    /// First port in the replication range that the probe accepts. The
    /// scan runs on the blocking pool.
    pub async fn find_available_port(&self) -> Option<u16> {
        let probe = Arc::clone(&self.probe);
        let ports = self.ports;
        match tokio::task::spawn_blocking(move || first_free_port(probe.as_ref(), ports)).await {
            Ok(port) => port,
            Err(e) => {
                warn!("Replication port scan failed: {e}");
                None
            }
        }
    }

    /// Run the gate against the current state. Returns `true` iff a launch
    /// was attempted.
    pub async fn attempt(&self, state: &NodeState) -> bool {
        let survival = state.survival();
        let peers = state.peer_count();
        if !self.should_replicate(survival, peers) {
            debug!(%survival, peers, "Replication not warranted");
            return false;
        }

        let Some(port) = self.find_available_port().await else {
            debug!(
                "No free port in {}..={} for replication",
                self.ports.first, self.ports.last
            );
            return false;
        };

        if !self.launcher.launch(port) {
            debug!(port, "Launcher declined replication");
        }
        true
    }
}

fn first_free_port(probe: &dyn PortProbe, ports: PortRange) -> Option<u16> {
    ports.iter().find(|&port| match probe.probe(port) {
        Ok(()) => true,
        Err(e) => {
            debug!("Skipping replication port: {e}");
            false
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
