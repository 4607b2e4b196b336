//! UDP sender.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use ipsocket_core::Signal;
use ipsocket_core::logging::targets;
use parking_lot::Mutex;

use super::config::UdpSenderConfig;
use crate::error::{NetworkError, Result};
use crate::resolve::resolve_ipv4;
use crate::shared::Shared;
use crate::state::{Role, TransceiverState, TransceiverStatus};
use crate::transceiver::{PacketSender, Transceiver};

/// Sends datagrams to one remote endpoint.
///
/// There is no receive path and no background thread: `open` binds a local
/// socket and connects it to the remote endpoint, each `send` writes one
/// datagram. Delivery is best effort. While open the state is `Connected`.
pub struct UdpSender {
    config: Mutex<UdpSenderConfig>,
    shared: Shared,
    socket: Mutex<Option<UdpSocket>>,
}

impl UdpSender {
    pub fn new(config: UdpSenderConfig) -> Self {
        Self {
            config: Mutex::new(config),
            shared: Shared::new(Role::Client),
            socket: Mutex::new(None),
        }
    }

    pub fn config(&self) -> UdpSenderConfig {
        self.config.lock().clone()
    }

    /// Replace the configuration. Takes effect at the next `open`.
    pub fn set_config(&self, config: UdpSenderConfig) {
        *self.config.lock() = config;
    }

    pub fn state_changed(&self) -> &Signal<TransceiverState> {
        &self.shared.signals.state_changed
    }

    fn bind(remote: SocketAddr, config: &UdpSenderConfig) -> Result<UdpSocket> {
        let local = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.fixed_local_port.unwrap_or(0)));
        let socket = UdpSocket::bind(local).map_err(|e| NetworkError::bind(local, e))?;
        socket.set_broadcast(config.broadcast)?;
        if let Some(ttl) = config.ttl {
            socket.set_ttl(ttl)?;
        }
        socket.connect(remote)?;
        Ok(socket)
    }
}

impl Transceiver for UdpSender {
    fn open(&self, address: &str, port: u16) -> Result<()> {
        let mut slot = self.socket.lock();
        if slot.is_some() {
            return Err(NetworkError::AlreadyOpen);
        }

        let remote = resolve_ipv4(address, port)?;
        let socket = Self::bind(remote, &self.config())?;
        let local = socket.local_addr().ok();
        *slot = Some(socket);
        drop(slot);

        self.shared.set_endpoints(local, Some(remote));
        self.shared.set_state(TransceiverState::Connected);
        tracing::info!(target: targets::UDP, %remote, ?local, "sender opened");
        Ok(())
    }

    fn close(&self) {
        if self.socket.lock().take().is_none() {
            return;
        }
        self.shared.set_state(TransceiverState::Closed);
        tracing::info!(target: targets::UDP, "sender closed");
    }

    fn state(&self) -> TransceiverState {
        self.shared.state()
    }

    fn status(&self) -> TransceiverStatus {
        self.shared.status()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.local_addr()
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.shared.remote_addr()
    }
}

impl PacketSender for UdpSender {
    /// Send `data` as one datagram.
    ///
    /// Fails with `NotOpen` when closed, or with an I/O error if the OS
    /// rejects the datagram (for example when it exceeds the maximum size).
    fn send(&self, data: &[u8]) -> Result<()> {
        let socket = self.socket.lock();
        let socket = socket.as_ref().ok_or(NetworkError::NotOpen)?;
        let sent = socket.send(data)?;
        tracing::trace!(target: targets::UDP, len = sent, "datagram sent");
        Ok(())
    }
}

impl std::fmt::Debug for UdpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpSender")
            .field("remote", &self.remote_addr())
            .field("state", &self.state())
            .finish()
    }
}
