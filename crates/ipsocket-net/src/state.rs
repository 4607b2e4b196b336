//! Lifecycle state, disconnect reasons and status snapshots.

use std::fmt;
use std::net::SocketAddr;

/// Current lifecycle state of a transceiver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransceiverState {
    /// Not open. The initial state and the state after `close()`.
    #[default]
    Closed,
    /// `open()` is binding or resolving.
    Opening,
    /// A client is dialing, or waiting before the next attempt.
    Connecting,
    /// A server is waiting for a client, or a UDP receiver is bound.
    Listening,
    /// A TCP session is established.
    Connected,
    /// A session just ended; the transceiver is about to reconnect, listen
    /// again or stop.
    Disconnected,
    /// `close()` is tearing the transceiver down.
    Closing,
}

impl TransceiverState {
    /// Whether `open()` has succeeded and `close()` has not completed.
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// Whether a TCP session is established.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Opening => write!(f, "Opening"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Listening => write!(f, "Listening"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

/// Why the most recent session ended or the most recent connect failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// No disconnect has happened yet, or a session is active.
    #[default]
    None,
    /// Closed locally.
    ByMe,
    /// Closed or reset by the peer.
    ByHim,
    /// A read or write timed out.
    Timeout,
    /// The connect attempt failed, or the session hit an unexpected I/O error.
    Failed,
}

impl DisconnectReason {
    /// A human-readable sentence for status bars.
    pub fn description(self) -> &'static str {
        match self {
            Self::None => "",
            Self::ByMe => "Disconnected by this side",
            Self::ByHim => "Disconnected by the remote side",
            Self::Timeout => "Disconnected by timeout",
            Self::Failed => "Connection failed",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::ByMe => write!(f, "ByMe"),
            Self::ByHim => write!(f, "ByHim"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Endpoints of an established TCP session, carried by the `connected` signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionInfo {
    pub local: SocketAddr,
    pub remote: SocketAddr,
}

/// Which side of the conversation a transceiver plays, for status text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Dials out (TCP client, UDP sender).
    Client,
    /// Waits for peers (TCP server, UDP receiver).
    Server,
}

/// A point-in-time snapshot of a transceiver, for presentation layers.
///
/// `Display` renders a one-line summary such as
/// `"Connected: remote 192.168.0.2 port 5000"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransceiverStatus {
    pub role: Role,
    pub state: TransceiverState,
    pub reason: DisconnectReason,
    pub local: Option<SocketAddr>,
    pub remote: Option<SocketAddr>,
}

impl TransceiverStatus {
    /// Short status word.
    pub fn headline(&self) -> &'static str {
        match self.state {
            TransceiverState::Closed => "Stopped",
            TransceiverState::Opening => "Opening",
            TransceiverState::Connecting => "Connecting",
            TransceiverState::Listening => "Waiting",
            TransceiverState::Connected => "Connected",
            TransceiverState::Disconnected => "Disconnected",
            TransceiverState::Closing => "Closing",
        }
    }

    /// Detail line: the relevant endpoint while connected, the reason after a
    /// disconnect, empty otherwise.
    ///
    /// A server reports the peer it is talking to; a client reports its own
    /// local endpoint.
    pub fn detail(&self) -> String {
        match self.state {
            TransceiverState::Connected => {
                let (label, addr) = match self.role {
                    Role::Server => ("remote", self.remote),
                    Role::Client => ("local", self.local),
                };
                match addr {
                    Some(addr) => format!("{label} {} port {}", addr.ip(), addr.port()),
                    None => String::new(),
                }
            }
            TransceiverState::Disconnected => self.reason.description().to_string(),
            _ => String::new(),
        }
    }
}

impl fmt::Display for TransceiverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self.detail();
        if detail.is_empty() {
            write!(f, "{}", self.headline())
        } else {
            write!(f, "{}: {}", self.headline(), detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(role: Role, state: TransceiverState, reason: DisconnectReason) -> TransceiverStatus {
        TransceiverStatus {
            role,
            state,
            reason,
            local: Some("10.0.0.1:50000".parse().unwrap()),
            remote: Some("10.0.0.2:5000".parse().unwrap()),
        }
    }

    #[test]
    fn test_state_predicates() {
        assert!(!TransceiverState::Closed.is_open());
        assert!(TransceiverState::Connecting.is_open());
        assert!(TransceiverState::Disconnected.is_open());
        assert!(TransceiverState::Connected.is_connected());
        assert!(!TransceiverState::Listening.is_connected());
    }

    #[test]
    fn test_status_display() {
        let s = status(Role::Server, TransceiverState::Connected, DisconnectReason::None);
        assert_eq!(s.to_string(), "Connected: remote 10.0.0.2 port 5000");

        let s = status(Role::Client, TransceiverState::Connected, DisconnectReason::None);
        assert_eq!(s.to_string(), "Connected: local 10.0.0.1 port 50000");

        let s = status(Role::Client, TransceiverState::Disconnected, DisconnectReason::Timeout);
        assert_eq!(s.to_string(), "Disconnected: Disconnected by timeout");

        let s = status(Role::Server, TransceiverState::Listening, DisconnectReason::ByHim);
        assert_eq!(s.to_string(), "Waiting");

        let s = status(Role::Client, TransceiverState::Closed, DisconnectReason::None);
        assert_eq!(s.to_string(), "Stopped");
    }
}
