//! Growth scheduler: the node's fixed-period life cycle.
//!
//! Every cycle learns one item. Every third cycle sweeps the discovery
//! ports, every fifth consults the replication gate, and every second
//! shares recent knowledge if any peer is known. Learning always comes
//! first within a cycle.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info};

use crate::config::NodeConfig;
use crate::knowledge::{COMPLEXITY_RANGE, KnowledgeItem};
use crate::replication::ReplicationGate;
use crate::state::{NodeState, SharedState, SurvivalLevel};
use crate::sync;
use crate::transport::FrameLimits;

/// Topics a node can learn about.
pub const TOPICS: [&str; 10] = [
    "Neural Network Optimization",
    "Distributed Systems",
    "Network Security",
    "Machine Learning",
    "Data Analysis",
    "Python Programming",
    "AI Ethics",
    "Blockchain Technology",
    "Cryptography",
    "Cloud Computing",
];

const DISCOVERY_EVERY: u64 = 3;
const REPLICATION_EVERY: u64 = 5;
const SHARE_EVERY: u64 = 2;

/// Learn one random item and grow. Returns the item learned.
pub fn learn_once(state: &NodeState, rng: &mut impl Rng) -> KnowledgeItem {
    let topic = TOPICS[rng.random_range(0..TOPICS.len())];
    let complexity = rng.random_range(COMPLEXITY_RANGE);
    let item = KnowledgeItem::new(topic, state.node_id().clone(), complexity);
    let survival = state.learn(item.clone());
    debug!(topic, complexity, %survival, "Learned");
    item
}

/// What one cycle did. `None` means the action was not due this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub learned_topic: String,
    pub survival: SurvivalLevel,
    /// Successful dials during discovery.
    pub discovered: Option<usize>,
    /// Whether the replication gate launched.
    pub replication_attempted: Option<bool>,
    /// Peers that acknowledged a share.
    pub shared: Option<usize>,
}

pub struct GrowthScheduler {
    state: SharedState,
    config: NodeConfig,
    gate: ReplicationGate,
    rng: StdRng,
}

impl GrowthScheduler {
    pub fn new(state: SharedState, config: NodeConfig, gate: ReplicationGate) -> Self {
        Self::with_rng(state, config, gate, StdRng::from_os_rng())
    }

    /// Scheduler with a caller-supplied generator, for reproducible runs.
    pub fn with_rng(
        state: SharedState,
        config: NodeConfig,
        gate: ReplicationGate,
        rng: StdRng,
    ) -> Self {
        Self {
            state,
            config,
            gate,
            rng,
        }
    }

    /// Dial every discovery port except our own. Returns how many answered.
    pub async fn discover(&self) -> usize {
        let own_port = self.state.port();
        let limits = FrameLimits::outbound(&self.config);
        let host = self.config.discovery_host.as_str();

        let mut found = 0;
        for &port in self.config.discovery_ports.iter().filter(|&&p| p != own_port) {
            if sync::dial_peer(&self.state, host, port, limits).await {
                found += 1;
            }
        }
        info!(found, peers = self.state.peer_count(), "Discovery sweep done");
        found
    }

    /// Run cycle `cycle` (1-based).
    pub async fn run_cycle(&mut self, cycle: u64) -> CycleReport {
        info!(
            cycle,
            node = %self.state.node_id(),
            survival = %self.state.survival(),
            knowledge = self.state.knowledge_count(),
            peers = self.state.peer_count(),
            "Growth cycle"
        );

        let item = learn_once(&self.state, &mut self.rng);

        let discovered = if cycle % DISCOVERY_EVERY == 0 {
            Some(self.discover().await)
        } else {
            None
        };

        let replication_attempted = if cycle % REPLICATION_EVERY == 0 {
            Some(self.gate.attempt(&self.state).await)
        } else {
            None
        };

        let shared = if cycle % SHARE_EVERY == 0 && self.state.has_peers() {
            let limits = FrameLimits::outbound(&self.config);
            Some(sync::share_knowledge(&self.state, limits).await)
        } else {
            None
        };

        CycleReport {
            cycle,
            learned_topic: item.topic,
            survival: self.state.survival(),
            discovered,
            replication_attempted,
            shared,
        }
    }

    /// Wait out the startup delay, sweep once, then cycle until shutdown.
    ///
    /// A cycle in progress always runs to the end; only the waits between
    /// cycles are cut short by a shutdown signal.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tokio::select! {
            _ = tokio::time::sleep(self.config.startup_delay) => {}
            _ = shutdown.recv() => {
                debug!("Scheduler stopped before first sweep");
                return;
            }
        }

        self.discover().await;

        let mut cycle = 0u64;
        loop {
            if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }

            cycle += 1;
            self.run_cycle(cycle).await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.cycle_interval) => {}
                _ = shutdown.recv() => break,
            }
        }
        debug!(cycles = cycle, "Scheduler stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
