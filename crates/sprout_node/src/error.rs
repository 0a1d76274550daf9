//! Node error types.

use std::time::Duration;

/// Errors that can occur in the sprout_node crate.
///
/// None of these are fatal to a running node. The one exception is
/// [`NodeError::BindUnavailable`] when it comes from binding the primary
/// listening port at startup.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// An outbound dial was refused or the address could not be reached.
    #[error("Connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    /// A dial, read, or write did not finish in time.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// The received bytes were empty, truncated, or did not match the schema.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// The peer sent more than the configured frame cap.
    #[error("Frame exceeds {0} bytes")]
    FrameTooLarge(usize),

    /// A port could not be bound.
    #[error("Port {port} unavailable: {reason}")]
    BindUnavailable { port: u16, reason: String },

    /// A connection handler task panicked.
    #[error("Connection handler panicked: {0}")]
    HandlerPanic(String),

    /// JSON serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// Whether the error came from bad input on the wire rather than from
    /// the network itself.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::MalformedMessage(_) | Self::FrameTooLarge(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_classification() {
        assert!(NodeError::MalformedMessage("empty".into()).is_protocol());
        assert!(NodeError::FrameTooLarge(1024).is_protocol());
        assert!(!NodeError::Timeout(Duration::from_secs(3)).is_protocol());
        assert!(
            !NodeError::Connect {
                addr: "localhost:8001".into(),
                reason: "refused".into()
            }
            .is_protocol()
        );
    }

    #[test]
    fn test_display_messages() {
        let err = NodeError::BindUnavailable {
            port: 8005,
            reason: "in use".into(),
        };
        assert_eq!(err.to_string(), "Port 8005 unavailable: in use");

        let err = NodeError::MalformedMessage("truncated frame".into());
        assert_eq!(err.to_string(), "Malformed message: truncated frame");
    }
}
