//! Shared node state: identity, knowledge log, peer registry and survival
//! level behind one handle.
//!
//! The server's connection handlers and the growth scheduler all hold an
//! `Arc<NodeState>`. Each structure has its own lock so that a long
//! knowledge snapshot never blocks a registry update. Locks are only taken
//! for in-memory work and are never held across an `.await`.

use std::fmt;
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::NodeConfig;
use crate::identity::{NodeId, NodeIdentity};
use crate::knowledge::{KnowledgeItem, KnowledgeStore};
use crate::peer::{PeerRecord, PeerRegistry};

// ---------------------------------------------------------------------------
// SurvivalLevel
// ---------------------------------------------------------------------------

/// Fitness score in `[1, 10]`, kept in whole tenths.
///
/// Learning adds exactly one tenth, so ten steps from `1.0` reach `2.0`
/// without floating-point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurvivalLevel(u8);

impl SurvivalLevel {
    pub const MIN: Self = Self(10);
    pub const MAX: Self = Self(100);

    /// Convert a wire value, rounding to the nearest tenth and clamping to
    /// `[1, 10]`. Non-finite input maps to the minimum.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            return Self::MIN;
        }
        let tenths = (value * 10.0).round().clamp(Self::MIN.0 as f64, Self::MAX.0 as f64);
        Self(tenths as u8)
    }

    pub fn value(self) -> f64 {
        f64::from(self.0) / 10.0
    }

    pub fn tenths(self) -> u8 {
        self.0
    }

    /// Add one tenth, saturating at the maximum.
    pub fn grown(self) -> Self {
        Self((self.0 + 1).min(Self::MAX.0))
    }
}

impl Default for SurvivalLevel {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for SurvivalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.value())
    }
}

impl Serialize for SurvivalLevel {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for SurvivalLevel {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        f64::deserialize(d).map(Self::from_f64)
    }
}

// ---------------------------------------------------------------------------
// NodeState
// ---------------------------------------------------------------------------

/// Cloneable handle to a node's state.
pub type SharedState = Arc<NodeState>;

/// Everything a node knows, guarded for concurrent access.
#[derive(Debug)]
pub struct NodeState {
    identity: NodeIdentity,
    knowledge: Mutex<KnowledgeStore>,
    peers: Mutex<PeerRegistry>,
    survival: Mutex<SurvivalLevel>,
}

impl NodeState {
    /// Fresh state: empty log, empty registry, minimum survival level.
    pub fn new(identity: NodeIdentity, config: &NodeConfig) -> Self {
        Self {
            identity,
            knowledge: Mutex::new(KnowledgeStore::with_cap(config.knowledge_cap)),
            peers: Mutex::new(PeerRegistry::with_cap(config.max_peers)),
            survival: Mutex::new(SurvivalLevel::MIN),
        }
    }

    pub fn shared(identity: NodeIdentity, config: &NodeConfig) -> SharedState {
        Arc::new(Self::new(identity, config))
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn node_id(&self) -> &NodeId {
        &self.identity.id
    }

    pub fn port(&self) -> u16 {
        self.identity.port
    }

    // ── Knowledge ───────────────────────────────────────────────────

    pub fn knowledge_count(&self) -> usize {
        self.knowledge.lock().count()
    }

    /// Append items to the log. Returns how many were appended.
    pub fn merge_knowledge(&self, items: Vec<KnowledgeItem>) -> usize {
        let n = items.len();
        self.knowledge.lock().append_all(items);
        n
    }

    pub fn recent_knowledge(&self, n: usize) -> Vec<KnowledgeItem> {
        self.knowledge.lock().last_n(n)
    }

    pub fn knowledge_snapshot(&self) -> Vec<KnowledgeItem> {
        self.knowledge.lock().snapshot()
    }

    /// Record a freshly learned item and grow the survival level by one
    /// step. Returns the new level.
    pub fn learn(&self, item: KnowledgeItem) -> SurvivalLevel {
        self.knowledge.lock().append(item);
        let mut survival = self.survival.lock();
        *survival = survival.grown();
        *survival
    }

    // ── Peers ───────────────────────────────────────────────────────

    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn has_peers(&self) -> bool {
        !self.peers.lock().is_empty()
    }

    pub fn first_peers(&self, n: usize) -> Vec<PeerRecord> {
        self.peers.lock().first_n(n)
    }

    pub fn peers_snapshot(&self) -> Vec<PeerRecord> {
        self.peers.lock().snapshot()
    }

    /// Record a peer seen on an outbound sync.
    ///
    /// New ids are inserted; known ids only get `last_contact` refreshed.
    /// Our own id is never recorded. Returns whether a record was inserted.
    pub fn record_contact(&self, record: PeerRecord) -> bool {
        if &record.id == self.node_id() {
            return false;
        }
        let mut peers = self.peers.lock();
        if peers.contains(&record.id) {
            peers.touch(&record.id, Local::now().naive_local());
            false
        } else {
            peers.add_if_new(record)
        }
    }

    // ── Survival ────────────────────────────────────────────────────

    pub fn survival(&self) -> SurvivalLevel {
        *self.survival.lock()
    }

    /// Raise the level to `remote` if it is higher. Returns the new level.
    pub fn raise_survival(&self, remote: SurvivalLevel) -> SurvivalLevel {
        let mut survival = self.survival.lock();
        *survival = (*survival).max(remote);
        *survival
    }

    #[cfg(test)]
    pub(crate) fn set_survival(&self, level: SurvivalLevel) {
        *self.survival.lock() = level;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
