//! Logging facilities for ipsocket.
//!
//! ipsocket uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("ipsocket_net::tcp=debug,ipsocket_net::udp=info")
//!         .init();
//! }
//! ```
//!
//! Every event is emitted with one of the [`targets`] so logs can be filtered
//! per subsystem. Lifecycle changes are logged at `info`, individual packets
//! at `trace`.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "ipsocket_core::signal";
    /// Networking crate target.
    pub const NET: &str = "ipsocket_net";
    /// TCP client and server target.
    pub const TCP: &str = "ipsocket_net::tcp";
    /// UDP sender and receiver target.
    pub const UDP: &str = "ipsocket_net::udp";
}

/// Span names used for the background thread of each transceiver kind.
pub mod span_names {
    /// TCP client connection loop.
    pub const TCP_CLIENT: &str = "tcp_client";
    /// TCP server accept loop.
    pub const TCP_SERVER: &str = "tcp_server";
    /// UDP receive loop.
    pub const UDP_RECEIVER: &str = "udp_receiver";
}

/// Build the name of a background thread from its span name and endpoint.
///
/// Thread names show up in panic messages and debuggers, which makes it easy
/// to tell several transceivers apart.
pub fn thread_name(kind: &str, endpoint: impl std::fmt::Display) -> String {
    format!("ipsocket-{kind}-{endpoint}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_share_crate_prefix() {
        assert!(targets::SIGNAL.starts_with("ipsocket_core"));
        assert!(targets::TCP.starts_with(targets::NET));
        assert!(targets::UDP.starts_with(targets::NET));
    }

    #[test]
    fn test_thread_name() {
        assert_eq!(
            thread_name(span_names::TCP_CLIENT, "127.0.0.1:9000"),
            "ipsocket-tcp_client-127.0.0.1:9000"
        );
    }
}
