//! Configuration types for UDP transceivers.

use std::time::Duration;

use crate::tcp::DEFAULT_POLLING_INTERVAL;

/// Default receive buffer size, one Ethernet MTU. Longer datagrams are
/// truncated.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 1500;

/// Configuration for a UDP sender.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UdpSenderConfig {
    /// Send from this local port. `None` uses an ephemeral port.
    pub fixed_local_port: Option<u16>,
    /// Allow sending to broadcast addresses.
    pub broadcast: bool,
    /// IP time-to-live of outgoing datagrams. `None` keeps the OS default.
    pub ttl: Option<u32>,
}

impl UdpSenderConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send from a fixed local port.
    pub fn fixed_local_port(mut self, port: u16) -> Self {
        self.fixed_local_port = Some(port);
        self
    }

    /// Enable broadcast mode.
    pub fn broadcast(mut self, enabled: bool) -> Self {
        self.broadcast = enabled;
        self
    }

    /// Set the IP time-to-live.
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Configuration for a UDP receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UdpReceiverConfig {
    /// Receive buffer size in bytes.
    pub recv_buffer_size: usize,
    /// Accept broadcast datagrams.
    pub broadcast: bool,
    /// Interval at which `wait_*` polls the packet queue.
    pub polling_interval: Duration,
}

impl Default for UdpReceiverConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            broadcast: false,
            polling_interval: DEFAULT_POLLING_INTERVAL,
        }
    }
}

impl UdpReceiverConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Enable broadcast mode.
    pub fn broadcast(mut self, enabled: bool) -> Self {
        self.broadcast = enabled;
        self
    }

    /// Set the queue polling interval.
    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }
}
