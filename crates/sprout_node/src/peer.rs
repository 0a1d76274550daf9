//! Peer registry: the nodes we have successfully synced with.

use std::collections::HashMap;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::identity::NodeId;

/// A peer learned through an outbound sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: NodeId,
    /// Host exactly as it was dialed.
    pub host: String,
    pub port: u16,
    pub last_contact: NaiveDateTime,
}

impl PeerRecord {
    /// A record for a peer contacted just now.
    pub fn contacted_now(id: NodeId, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
            last_contact: Local::now().naive_local(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Registry of known peers, unique by id, iterated in insertion order.
///
/// Records are never removed and never re-addressed: a peer that moves is
/// still reached at the address it was first seen on.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    order: Vec<PeerRecord>,
    index: HashMap<NodeId, usize>,
    cap: Option<usize>,
}

impl PeerRegistry {
    /// Create an empty, unbounded registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that refuses new ids once `cap` are known.
    pub fn with_cap(cap: Option<usize>) -> Self {
        Self {
            cap,
            ..Self::default()
        }
    }

    /// Insert `record` unless its id is already known. Returns whether it
    /// was inserted.
    pub fn add_if_new(&mut self, record: PeerRecord) -> bool {
        if self.index.contains_key(&record.id) {
            return false;
        }
        if self.cap.is_some_and(|cap| self.order.len() >= cap) {
            tracing::debug!(peer = %record.id, "Peer registry full, not recording");
            return false;
        }
        self.index.insert(record.id.clone(), self.order.len());
        self.order.push(record);
        true
    }

    /// Update `last_contact` for a known peer. Unknown ids are ignored.
    pub fn touch(&mut self, id: &NodeId, time: NaiveDateTime) {
        if let Some(&i) = self.index.get(id) {
            self.order[i].last_contact = time;
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&PeerRecord> {
        self.index.get(id).map(|&i| &self.order[i])
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    /// The first `n` peers in insertion order.
    pub fn first_n(&self, n: usize) -> Vec<PeerRecord> {
        self.order.iter().take(n).cloned().collect()
    }

    /// The last `n` peers in insertion order.
    pub fn last_n(&self, n: usize) -> Vec<PeerRecord> {
        let skip = self.order.len().saturating_sub(n);
        self.order[skip..].to_vec()
    }

    /// A copy of every record in insertion order.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_peer(id: &str, port: u16) -> PeerRecord {
        PeerRecord::contacted_now(NodeId::from_string(id), "localhost", port)
    }

    fn ids(records: &[PeerRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_add_if_new_inserts_once() {
        let mut registry = PeerRegistry::new();
        assert!(registry.add_if_new(make_peer("alpha", 8001)));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&NodeId::from_string("alpha")));
    }

    #[test]
    fn test_add_if_new_is_idempotent_first_wins() {
        let mut registry = PeerRegistry::new();
        assert!(registry.add_if_new(make_peer("alpha", 8001)));

        let mut moved = make_peer("alpha", 8003);
        moved.host = "10.0.0.9".into();
        assert!(!registry.add_if_new(moved));

        assert_eq!(registry.len(), 1);
        let kept = registry.get(&NodeId::from_string("alpha")).unwrap();
        assert_eq!(kept.host, "localhost");
        assert_eq!(kept.port, 8001);
    }

    #[test]
    fn test_touch_updates_known_and_ignores_unknown() {
        let mut registry = PeerRegistry::new();
        registry.add_if_new(make_peer("alpha", 8001));

        let later = NaiveDateTime::parse_from_str("2030-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        registry.touch(&NodeId::from_string("alpha"), later);
        registry.touch(&NodeId::from_string("ghost"), later);

        assert_eq!(
            registry
                .get(&NodeId::from_string("alpha"))
                .unwrap()
                .last_contact,
            later
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ordered_views() {
        let mut registry = PeerRegistry::new();
        for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
            registry.add_if_new(make_peer(id, 8001 + i as u16));
        }
        assert_eq!(ids(&registry.first_n(2)), vec!["a", "b"]);
        assert_eq!(ids(&registry.last_n(2)), vec!["c", "d"]);
        assert_eq!(ids(&registry.first_n(10)).len(), 4);
        assert_eq!(ids(&registry.last_n(10)), vec!["a", "b", "c", "d"]);
        assert_eq!(ids(&registry.snapshot()), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_cap_refuses_new_ids() {
        let mut registry = PeerRegistry::with_cap(Some(1));
        assert!(registry.add_if_new(make_peer("a", 8001)));
        assert!(!registry.add_if_new(make_peer("b", 8002)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_record_addr_and_wire_shape() {
        let record = make_peer("NODE_8002_1111", 8002);
        assert_eq!(record.addr(), "localhost:8002");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "NODE_8002_1111");
        assert_eq!(json["host"], "localhost");
        assert_eq!(json["port"], 8002);
        assert!(json["last_contact"].is_string());
    }
}
