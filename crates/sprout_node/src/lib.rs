//! Sprout Node: a small self-growing peer-to-peer knowledge node.
//!
//! Each node keeps an in-memory knowledge log, learns one item per growth
//! cycle, finds peers by dialing a fixed set of local ports, swaps knowledge
//! with them over a one-shot JSON request/response protocol, and decides
//! when it is fit enough to replicate onto a free port.
//!
//! # Architecture
//!
//! - **Protocol**: one JSON object per request and per response, one TCP
//!   connection per exchange (`message`, `transport`).
//! - **State**: knowledge log, peer registry and survival level behind one
//!   shared handle (`state`).
//! - **Inbound**: accept loop with a task per connection (`server`,
//!   `handler`). Answering never registers the caller.
//! - **Outbound**: sync and share (`sync`). Peers enter the registry only
//!   when we dial them.
//! - **Growth**: the periodic cycle (`scheduler`) and the replication
//!   decision (`replication`).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use sprout_node::{Node, NodeConfig};
//!
//! # async fn example() {
//! let node = Node::start(NodeConfig::with_port(8000)).await.unwrap();
//! // ... node is serving peers and growing ...
//! node.stop().await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod identity;
pub mod knowledge;
pub mod message;
pub mod node;
pub mod peer;
pub mod replication;
pub mod scheduler;
pub mod server;
pub mod state;
pub mod sync;
pub mod transport;

// ── Re-exports for convenience ──────────────────────────────────────────

pub use config::{NodeConfig, PortRange};
pub use error::NodeError;
pub use identity::{NodeId, NodeIdentity};
pub use knowledge::{KnowledgeItem, KnowledgeStore};
pub use message::Message;
pub use node::Node;
pub use peer::{PeerRecord, PeerRegistry};
pub use replication::{LoggingLauncher, PortProbe, ReplicationGate, ReplicationLauncher};
pub use scheduler::{CycleReport, GrowthScheduler};
pub use state::{NodeState, SharedState, SurvivalLevel};
