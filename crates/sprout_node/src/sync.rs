//! Outbound exchanges: syncing with a peer we dial, and pushing recent
//! knowledge to peers we already know.
//!
//! This is the only place peers enter the registry.

use tracing::{debug, info, warn};

use crate::error::NodeError;
use crate::message::Message;
use crate::peer::PeerRecord;
use crate::state::NodeState;
use crate::transport::{self, FrameLimits};

/// Items offered in a `SYNC` request.
pub const SYNC_OFFER_ITEMS: usize = 5;
/// Items pushed per `LEARN` during sharing.
pub const SHARE_ITEMS: usize = 3;
/// Peers contacted per sharing round.
pub const SHARE_FANOUT: usize = 2;

// ---------------------------------------------------------------------------
// Dial
// ---------------------------------------------------------------------------

/// Sync with the node at `host:port` and return whatever it answered.
///
/// A `SYNC_RESPONSE` is folded into local state: the remote node is
/// recorded under the address we dialed, its knowledge is appended, and our
/// survival level is raised to its level if higher.
pub async fn sync_with(
    state: &NodeState,
    host: &str,
    port: u16,
    limits: FrameLimits,
) -> Result<Message, NodeError> {
    let request = Message::Sync {
        node_id: state.node_id().clone(),
        knowledge: state.recent_knowledge(SYNC_OFFER_ITEMS),
        port: state.port(),
    };

    let response = transport::request(host, port, &request, limits).await?;
    if let Message::SyncResponse {
        node_id,
        knowledge,
        survival_level,
        ..
    } = &response
    {
        let inserted = state.record_contact(PeerRecord::contacted_now(node_id.clone(), host, port));
        if inserted {
            info!(peer = %node_id, "Discovered node at {host}:{port}");
        }
        let merged = state.merge_knowledge(knowledge.clone());
        let survival = state.raise_survival(*survival_level);
        debug!(peer = %node_id, merged, %survival, "Synced");
    }
    Ok(response)
}

/// Dial a peer once. Returns `true` if any well-formed reply came back,
/// whatever its kind.
pub async fn dial_peer(state: &NodeState, host: &str, port: u16, limits: FrameLimits) -> bool {
    match sync_with(state, host, port, limits).await {
        Ok(_) => true,
        Err(e) => {
            debug!("Dial {host}:{port} failed: {e}");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Share
// ---------------------------------------------------------------------------

/// Push our most recent items to the first few known peers.
///
/// Returns how many peers acknowledged. Failures are logged and not retried.
pub async fn share_knowledge(state: &NodeState, limits: FrameLimits) -> usize {
    let recent = state.recent_knowledge(SHARE_ITEMS);
    if recent.is_empty() {
        return 0;
    }

    let request = Message::Learn {
        node_id: state.node_id().clone(),
        knowledge: recent,
    };

    let mut delivered = 0;
    for peer in state.first_peers(SHARE_FANOUT) {
        match transport::request(&peer.host, peer.port, &request, limits).await {
            Ok(Message::LearnAck { received_count }) => {
                debug!(peer = %peer.id, received_count, "Shared knowledge");
                delivered += 1;
            }
            Ok(other) => {
                warn!(peer = %peer.id, "Share to {} got {} instead of LEARN_ACK", peer.addr(), other.type_name());
            }
            Err(e) => {
                warn!(peer = %peer.id, "Share to {} failed: {e}", peer.addr());
            }
        }
    }
    delivered
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
