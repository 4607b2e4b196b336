//! Configuration types for TCP client and server.

use std::time::Duration;

/// Default read buffer size, one Ethernet MTU.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1500;

/// Default number of packets waiting to be written before `send` refuses
/// more.
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 64;

/// Default interval at which `wait_*` polls the packet queue.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(20);

/// Socket-level options for TCP sessions.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TcpSocketConfig {
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub no_delay: bool,
    /// Maximum bytes taken by one read; each read becomes one queued packet.
    pub read_buffer_size: usize,
    /// Read timeout. `None` means no timeout. A session with no inbound data
    /// for this long ends with `DisconnectReason::Timeout`.
    pub read_timeout: Option<Duration>,
    /// Write timeout. `None` means no timeout. A packet that makes no
    /// progress into the OS send buffer for this long ends the session with
    /// `DisconnectReason::Timeout`.
    pub write_timeout: Option<Duration>,
    /// Packets accepted by `send` but not yet written. Beyond this `send`
    /// fails with `NetworkError::SendQueueFull`.
    pub send_queue_capacity: usize,
}

impl Default for TcpSocketConfig {
    fn default() -> Self {
        Self {
            no_delay: false,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            read_timeout: None,
            write_timeout: None,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
        }
    }
}

impl TcpSocketConfig {
    /// Create a new socket configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Set how many packets may wait to be written.
    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity;
        self
    }

    /// Set read and write timeouts together.
    ///
    /// A peer that neither sends nor accepts data for `timeout` is considered
    /// dead.
    pub fn alive_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self.write_timeout = Some(timeout);
        self
    }

    /// Remove the read and write timeouts.
    pub fn no_timeouts(mut self) -> Self {
        self.read_timeout = None;
        self.write_timeout = None;
        self
    }
}

/// Configuration for automatic reconnection.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReconnectConfig {
    /// Maximum number of consecutive reconnection attempts. `None` means
    /// infinite retries.
    pub max_attempts: Option<u32>,
    /// Initial delay between reconnection attempts.
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Create a new reconnect configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of reconnection attempts.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the initial delay between reconnection attempts.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between reconnection attempts.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier for exponential backoff.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculate the delay before attempt `attempt` (0-indexed), with ±10%
    /// jitter, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base_delay_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_delay_ms * self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64).max(0.0);

        let jitter_range = delay_ms * 0.1;
        let jitter = if jitter_range >= 1.0 {
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }
}

/// Configuration for a TCP client.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TcpClientConfig {
    /// Socket-level options.
    pub socket: TcpSocketConfig,
    /// Connection timeout. `None` waits for the OS to give up.
    pub connect_timeout: Option<Duration>,
    /// Bind to this local port before connecting. `None` uses an ephemeral
    /// port.
    pub fixed_local_port: Option<u16>,
    /// Auto-reconnect configuration. If `None`, the client stops after the
    /// first failed attempt or the first session.
    pub reconnect: Option<ReconnectConfig>,
    /// Interval at which `wait_*` polls the packet queue.
    pub polling_interval: Duration,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            socket: TcpSocketConfig::default(),
            connect_timeout: Some(Duration::from_secs(5)),
            fixed_local_port: None,
            reconnect: Some(ReconnectConfig::default()),
            polling_interval: DEFAULT_POLLING_INTERVAL,
        }
    }
}

impl TcpClientConfig {
    /// Create a new client configuration with auto-reconnect enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set socket options.
    pub fn socket_config(mut self, config: TcpSocketConfig) -> Self {
        self.socket = config;
        self
    }

    /// Enable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.socket.no_delay = enabled;
        self
    }

    /// Set read and write timeouts together.
    pub fn alive_timeout(mut self, timeout: Duration) -> Self {
        self.socket = self.socket.alive_timeout(timeout);
        self
    }

    /// Set connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disable connection timeout.
    pub fn no_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Bind to a fixed local port before connecting.
    pub fn fixed_local_port(mut self, port: u16) -> Self {
        self.fixed_local_port = Some(port);
        self
    }

    /// Enable auto-reconnect with custom configuration.
    pub fn reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = Some(config);
        self
    }

    /// Disable auto-reconnect: connect once, and stop when that fails or the
    /// session ends.
    pub fn single_shot(mut self) -> Self {
        self.reconnect = None;
        self
    }

    /// Set the queue polling interval.
    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }
}

/// Configuration for a TCP server.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TcpServerConfig {
    /// Socket-level options for accepted connections.
    pub socket: TcpSocketConfig,
    /// IP time-to-live of the listening socket, inherited by sessions.
    pub ttl: u32,
    /// Connection backlog size.
    pub backlog: u32,
    /// Interval at which `wait_*` polls the packet queue.
    pub polling_interval: Duration,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            socket: TcpSocketConfig::default(),
            ttl: 255,
            backlog: 1,
            polling_interval: DEFAULT_POLLING_INTERVAL,
        }
    }
}

impl TcpServerConfig {
    /// Create a new server configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set socket options for accepted connections.
    pub fn socket_config(mut self, config: TcpSocketConfig) -> Self {
        self.socket = config;
        self
    }

    /// Enable TCP_NODELAY for accepted connections.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.socket.no_delay = enabled;
        self
    }

    /// Set read and write timeouts together for accepted connections.
    pub fn alive_timeout(mut self, timeout: Duration) -> Self {
        self.socket = self.socket.alive_timeout(timeout);
        self
    }

    /// Set the IP time-to-live.
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the connection backlog size.
    pub fn backlog(mut self, size: u32) -> Self {
        self.backlog = size;
        self
    }

    /// Set the queue polling interval.
    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_for_attempt_backoff_and_cap() {
        let config = ReconnectConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(1000))
            .backoff_multiplier(2.0);

        let d0 = config.delay_for_attempt(0).as_millis();
        assert!((90..=110).contains(&d0), "{d0}");
        let d2 = config.delay_for_attempt(2).as_millis();
        assert!((360..=440).contains(&d2), "{d2}");
        let d10 = config.delay_for_attempt(10).as_millis();
        assert!((900..=1100).contains(&d10), "{d10}");
    }

    #[test]
    fn test_zero_delay() {
        let config = ReconnectConfig::new().initial_delay(Duration::ZERO);
        assert_eq!(config.delay_for_attempt(5), Duration::ZERO);
    }

    #[test]
    fn test_alive_timeout_sets_both() {
        let config = TcpSocketConfig::new().alive_timeout(Duration::from_secs(3));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.write_timeout, Some(Duration::from_secs(3)));
        let config = config.no_timeouts();
        assert_eq!(config.read_timeout, None);
    }
}
