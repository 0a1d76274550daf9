//! TCP transport: one connection per exchange, one frame each way.
//!
//! Frames carry no length prefix. A reader keeps reading until the buffer
//! holds one complete JSON value, the peer closes, or the frame cap is hit.
//! A requester half-closes its write side after sending, so readers that
//! wait for EOF also work.

use std::time::Duration;

use serde::de::IgnoredAny;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::message::Message;

const READ_CHUNK: usize = 8 * 1024;

/// Time and size bounds for one exchange.
#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    /// Outbound: bound on connecting, and separately on the write + read
    /// that follow. Inbound: bound on reading the request, and separately
    /// on writing the reply.
    pub timeout: Duration,
    pub max_frame_bytes: usize,
}

impl FrameLimits {
    /// Limits for dialing a peer.
    pub fn outbound(config: &NodeConfig) -> Self {
        Self {
            timeout: config.dial_timeout,
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// Limits for serving an accepted connection.
    pub fn inbound(config: &NodeConfig) -> Self {
        Self {
            timeout: config.read_timeout,
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

enum FrameState {
    /// Not a complete JSON value yet.
    Partial,
    /// A complete value, or bytes that can never become one.
    Ready,
}

fn frame_state(buf: &[u8]) -> FrameState {
    let mut values = serde_json::Deserializer::from_slice(buf).into_iter::<IgnoredAny>();
    match values.next() {
        Some(Err(e)) if e.is_eof() => FrameState::Partial,
        Some(_) => FrameState::Ready,
        None => FrameState::Partial,
    }
}

/// Read one frame.
///
/// Returns the raw bytes once they form a complete JSON value (or can no
/// longer become one; [`Message::decode`] reports those). EOF before that
/// point is a truncated frame.
pub async fn read_frame<R>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>, NodeError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            let reason = if buf.iter().all(u8::is_ascii_whitespace) {
                "empty frame"
            } else {
                "truncated frame"
            };
            return Err(NodeError::MalformedMessage(reason.into()));
        }

        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > max_bytes {
            return Err(NodeError::FrameTooLarge(max_bytes));
        }

        if let FrameState::Ready = frame_state(&buf) {
            trace!(bytes = buf.len(), "Frame complete");
            return Ok(buf);
        }
    }
}

/// Read and decode one message.
pub async fn read_message<R>(reader: &mut R, max_bytes: usize) -> Result<Message, NodeError>
where
    R: AsyncRead + Unpin,
{
    let frame = read_frame(reader, max_bytes).await?;
    Message::decode(&frame)
}

/// Encode and write one message.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), NodeError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = message.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Open a connection to `host:port` within `timeout`.
pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, NodeError> {
    let addr = format!("{host}:{port}");
    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(NodeError::Connect {
            addr,
            reason: e.to_string(),
        }),
        Err(_) => Err(NodeError::Timeout(timeout)),
    }
}

/// Send one request to `host:port` and wait for one response.
pub async fn request(
    host: &str,
    port: u16,
    message: &Message,
    limits: FrameLimits,
) -> Result<Message, NodeError> {
    let mut stream = connect(host, port, limits.timeout).await?;

    let exchange = async {
        write_message(&mut stream, message).await?;
        stream.shutdown().await?;
        read_message(&mut stream, limits.max_frame_bytes).await
    };

    match tokio::time::timeout(limits.timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(NodeError::Timeout(limits.timeout)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
