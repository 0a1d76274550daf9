//! Inbound request handling.
//!
//! One accepted connection carries one request. The handler answers it from
//! the shared state and closes. Anything that fails to decode is dropped
//! without a reply.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::error::NodeError;
use crate::message::Message;
use crate::state::{NodeState, SharedState};
use crate::transport::{self, FrameLimits};

/// Build the reply to one decoded request.
///
/// Only `LEARN` mutates state (the knowledge log). The peer registry is
/// never touched here: peers are recorded when we dial them, not when they
/// dial us.
pub fn handle_request(state: &NodeState, message: Message) -> Message {
    match message {
        Message::Ping => Message::Pong {
            node_id: state.node_id().clone(),
            knowledge_count: state.knowledge_count(),
        },
        Message::Sync { node_id, port, .. } => {
            trace!(from = %node_id, port, "Sync request");
            Message::SyncResponse {
                node_id: state.node_id().clone(),
                knowledge: state.knowledge_snapshot(),
                known_peers: state.peers_snapshot(),
                survival_level: state.survival(),
            }
        }
        Message::Learn { node_id, knowledge } => {
            let received_count = state.merge_knowledge(knowledge);
            debug!(from = %node_id, received_count, "Merged shared knowledge");
            Message::LearnAck { received_count }
        }
        other => {
            trace!(kind = other.type_name(), "Unsupported request");
            Message::Unknown
        }
    }
}

/// Serve one accepted connection to completion.
///
/// The stream is closed when this returns, whatever the outcome. On a read
/// or decode failure nothing is written back.
pub async fn handle_connection(
    state: SharedState,
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    limits: FrameLimits,
) -> Result<(), NodeError> {
    let read = transport::read_message(&mut stream, limits.max_frame_bytes);
    let request = match tokio::time::timeout(limits.timeout, read).await {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            log_dropped(peer_addr, &e);
            return Err(e);
        }
        Err(_) => {
            debug!(%peer_addr, "Dropping connection: read timed out");
            return Err(NodeError::Timeout(limits.timeout));
        }
    };

    let kind = request.type_name();
    let response = handle_request(&state, request);
    trace!(%peer_addr, request = kind, response = response.type_name(), "Answering");

    // A caller that never reads must not pin this task once the reply
    // outgrows the socket buffers.
    let reply = async {
        transport::write_message(&mut stream, &response).await?;
        stream.shutdown().await?;
        Ok::<(), NodeError>(())
    };
    match tokio::time::timeout(limits.timeout, reply).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            log_dropped(peer_addr, &e);
            Err(e)
        }
        Err(_) => {
            debug!(%peer_addr, "Dropping connection: reply not taken in time");
            Err(NodeError::Timeout(limits.timeout))
        }
    }
}

/// Bad input from a peer is routine; anything else is worth a warning.
fn log_dropped(peer_addr: SocketAddr, err: &NodeError) {
    if err.is_protocol() {
        debug!(%peer_addr, "Dropping connection: {err}");
    } else {
        warn!(%peer_addr, "Connection failed: {err}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
