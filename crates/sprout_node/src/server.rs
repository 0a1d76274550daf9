//! Node server: accept loop with one task per inbound connection.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::NodeError;
use crate::handler;
use crate::state::SharedState;
use crate::transport::FrameLimits;

/// Pause after a failed accept. Errors such as running out of file
/// descriptors come back immediately on retry.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A bound listener, ready to serve.
///
/// Binding is split from serving so that the node can learn its real port
/// (for `port = 0`) before it builds its identity.
pub struct NodeServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl NodeServer {
    /// Bind `host:port`. Failure here is fatal to node startup.
    pub async fn bind(host: &str, port: u16) -> Result<Self, NodeError> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| NodeError::BindUnavailable {
                port,
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until a shutdown signal arrives, then wait for in-flight
    /// handlers to finish.
    pub async fn run(
        self,
        state: SharedState,
        limits: FrameLimits,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("Node server listening on {}", self.local_addr);
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            debug!(%peer_addr, "Accepted connection");
                            let state = state.clone();
                            handlers.spawn(async move {
                                handler::handle_connection(state, stream, peer_addr, limits).await
                            });
                        }
                        Err(e) => back_off_after_accept_error(&e).await,
                    }
                }
                Some(joined) = handlers.join_next() => {
                    reap(joined);
                }
                _ = shutdown.recv() => {
                    debug!("Node server shutting down");
                    break;
                }
            }
        }

        drop(self.listener);
        let pending = handlers.len();
        if pending > 0 {
            debug!(pending, "Draining connection handlers");
        }
        while let Some(joined) = handlers.join_next().await {
            reap(joined);
        }
        info!("Node server on {} stopped", self.local_addr);
    }
}

async fn back_off_after_accept_error(err: &std::io::Error) {
    warn!("Accept error: {err}; retrying in {ACCEPT_BACKOFF:?}");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Log the outcome of a finished handler task. Returns the error it ended
/// with, if any; a panic becomes [`NodeError::HandlerPanic`].
fn reap(joined: Result<Result<(), NodeError>, JoinError>) -> Option<NodeError> {
    match joined {
        Ok(Ok(())) => None,
        // Already logged by the handler.
        Ok(Err(e)) => Some(e),
        Err(e) => {
            let err = NodeError::HandlerPanic(panic_message(e));
            error!("{err}");
            Some(err)
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::config::NodeConfig;
    use crate::identity::{NodeId, NodeIdentity};
    use crate::message::Message;
    use crate::state::NodeState;
    use crate::transport;

    fn make_state() -> SharedState {
        let identity = NodeIdentity {
            id: NodeId::from_string("NODE_9100_1234"),
            port: 9100,
        };
        NodeState::shared(identity, &NodeConfig::default())
    }

    fn limits() -> FrameLimits {
        FrameLimits {
            timeout: Duration::from_millis(500),
            max_frame_bytes: 64 * 1024,
        }
    }

    #[tokio::test]
    async fn test_bind_reports_port_in_use() {
        let first = NodeServer::bind("127.0.0.1", 0).await.unwrap();
        let port = first.local_addr().port();
        match NodeServer::bind("127.0.0.1", port).await {
            Err(NodeError::BindUnavailable { port: p, .. }) => assert_eq!(p, port),
            other => panic!("Expected BindUnavailable, got {:?}", other.map(|s| s.local_addr())),
        }
    }

    #[tokio::test]
    async fn test_serves_requests_until_shutdown() {
        let server = NodeServer::bind("127.0.0.1", 0).await.unwrap();
        let addr = server.local_addr();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(server.run(make_state(), limits(), shutdown_rx));

        // A bad request does not stop the server.
        let mut bad = TcpStream::connect(addr).await.unwrap();
        bad.write_all(b"not json at all").await.unwrap();
        bad.shutdown().await.unwrap();
        let mut reply = Vec::new();
        bad.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());

        for _ in 0..3 {
            let response = transport::request(
                "127.0.0.1",
                addr.port(),
                &Message::Ping,
                limits(),
            )
            .await
            .unwrap();
            assert!(matches!(response, Message::Pong { .. }));
        }

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server stops")
            .unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_accept_error_pauses_before_retry() {
        let err = std::io::Error::other("too many open files");
        let started = Instant::now();
        back_off_after_accept_error(&err).await;
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
    }

    #[tokio::test]
    async fn test_reap_turns_panic_into_handler_panic() {
        let mut set: JoinSet<Result<(), NodeError>> = JoinSet::new();
        set.spawn(async { panic!("handler blew up") });
        set.spawn(async { Ok(()) });

        let mut panics = Vec::new();
        while let Some(joined) = set.join_next().await {
            if let Some(NodeError::HandlerPanic(msg)) = reap(joined) {
                panics.push(msg);
            }
        }
        assert_eq!(panics, vec!["handler blew up".to_string()]);
    }
}
