//! Error types for the networking module.

/// Result type alias for transceiver operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Network-specific errors.
///
/// Carries `String` payloads rather than the source errors so it can be
/// cloned into [`Signal`](ipsocket_core::Signal) emissions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The host name could not be resolved to an IPv4 address.
    #[error("cannot resolve address '{0}'")]
    AddressResolution(String),

    /// Binding or listening on a local endpoint failed.
    #[error("cannot bind {addr}: {message}")]
    Bind {
        /// The endpoint that could not be bound.
        addr: String,
        /// The underlying OS error.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// `open` was called on a transceiver that is already open.
    #[error("transceiver is already open")]
    AlreadyOpen,

    /// The operation requires an open transceiver.
    #[error("transceiver is not open")]
    NotOpen,

    /// The operation requires an established TCP session.
    #[error("not connected")]
    NotConnected,

    /// Too many packets are already waiting to be written to the peer.
    #[error("send queue is full")]
    SendQueueFull,

    /// The background runtime or thread could not be started.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The operation timed out.
    #[error("operation timed out")]
    Timeout,
}

impl NetworkError {
    /// Create a bind error for the given endpoint.
    pub fn bind(addr: impl ToString, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.to_string(),
            message: source.to_string(),
        }
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            Self::Timeout
        } else {
            Self::Io(err.to_string())
        }
    }
}
