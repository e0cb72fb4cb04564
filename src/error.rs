//! Error types for skyalt-node.

use thiserror::Error;

/// Main error type for all node client operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host closed the connection (zero-byte read).
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// I/O attempted on a connection that was never opened or is already closed.
    #[error("Not connected")]
    NotConnected,

    /// Protocol error (unexpected message kind, malformed frame, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A length prefix announced more bytes than the configured maximum.
    #[error("Field size {len} exceeds maximum {max}")]
    FieldTooLarge { len: u64, max: usize },

    /// Port argument did not parse to a usable port number.
    #[error("Invalid port: {0:?}")]
    InvalidPort(String),

    /// A single read or write did not complete within the configured timeout.
    #[error("I/O timeout")]
    Timeout,

    /// Node logic failed while processing a request.
    #[error("Handler error: {0}")]
    Handler(String),
}

impl NodeError {
    /// Whether this error terminates the session.
    ///
    /// Transport and framing errors do; handler errors are reported to the
    /// host and the request loop carries on.
    pub fn ends_session(&self) -> bool {
        !matches!(self, NodeError::Handler(_))
    }
}

/// Result type alias using NodeError.
pub type Result<T> = std::result::Result<T, NodeError>;
