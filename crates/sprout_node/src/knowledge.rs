//! Knowledge log: the items a node has learned or been told about.

use std::collections::VecDeque;
use std::ops::RangeInclusive;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::identity::NodeId;

/// Allowed values for [`KnowledgeItem::complexity`].
pub const COMPLEXITY_RANGE: RangeInclusive<u8> = 1..=10;

/// One unit of learned information. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub topic: String,
    /// Local wall-clock time of creation, ISO-8601 without a zone.
    pub timestamp: NaiveDateTime,
    /// Node that originally learned the item.
    pub node_id: NodeId,
    pub complexity: u8,
}

impl KnowledgeItem {
    /// Create an item stamped with the current local time.
    pub fn new(topic: impl Into<String>, origin: NodeId, complexity: u8) -> Self {
        Self {
            topic: topic.into(),
            timestamp: Local::now().naive_local(),
            node_id: origin,
            complexity,
        }
    }

    pub fn has_valid_complexity(&self) -> bool {
        COMPLEXITY_RANGE.contains(&self.complexity)
    }
}

/// Append-only, insertion-ordered knowledge log.
///
/// Items are never deduplicated. Without a cap the log grows for the life
/// of the process; with a cap the oldest items are dropped first.
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    items: VecDeque<KnowledgeItem>,
    cap: Option<usize>,
}

impl KnowledgeStore {
    /// Create an empty, unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store holding at most `cap` items.
    pub fn with_cap(cap: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            cap,
        }
    }

    pub fn append(&mut self, item: KnowledgeItem) {
        self.items.push_back(item);
        self.evict_overflow();
    }

    pub fn append_all(&mut self, items: impl IntoIterator<Item = KnowledgeItem>) {
        self.items.extend(items);
        self.evict_overflow();
    }

    /// The most recent `min(n, count)` items, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<KnowledgeItem> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).cloned().collect()
    }

    /// A copy of every item, in append order.
    pub fn snapshot(&self) -> Vec<KnowledgeItem> {
        self.items.iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn evict_overflow(&mut self) {
        if let Some(cap) = self.cap {
            while self.items.len() > cap {
                self.items.pop_front();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
