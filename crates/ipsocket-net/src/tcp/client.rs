//! TCP client with reconnect and signal-based event delivery.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use ipsocket_core::Signal;
use ipsocket_core::logging::{span_names, targets, thread_name};
use parking_lot::Mutex;
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::config::TcpClientConfig;
use super::session::{self, Outbox};
use crate::error::{NetworkError, Result};
use crate::queue::PacketQueue;
use crate::resolve::resolve_ipv4;
use crate::shared::{Shared, TransceiverSignals};
use crate::state::{ConnectionInfo, DisconnectReason, Role, TransceiverState, TransceiverStatus};
use crate::transceiver::{PacketReceiver, PacketSender, Transceiver};
use crate::worker::{Worker, build_runtime};

/// A TCP client that keeps one connection to a server.
///
/// `open` returns as soon as the address is resolved; connecting happens on a
/// background thread. Every read from the server becomes one packet in the
/// client's queue. When the connection fails or ends, the client waits and
/// dials again, unless the configuration is
/// [`single_shot`](TcpClientConfig::single_shot).
///
/// # Signals
///
/// - [`connected`](Self::connected): the connection is established
/// - [`disconnected`](Self::disconnected): the connection ended, or an attempt
///   failed (`DisconnectReason::Failed`)
/// - [`received`](Self::received): a packet was queued
/// - [`state_changed`](Self::state_changed): the lifecycle state changed
/// - [`error`](Self::error): a session ended on an unexpected I/O error
///   (`DisconnectReason::Failed`)
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use ipsocket_net::tcp::{TcpClient, TcpClientConfig};
/// use ipsocket_net::{PacketReceiver, PacketSender, Transceiver};
///
/// let client = TcpClient::new(TcpClientConfig::new().no_delay(true));
/// client.connected().connect(|info| println!("connected to {}", info.remote));
///
/// client.open("127.0.0.1", 5000)?;
/// while !client.is_connected() {
///     std::thread::sleep(Duration::from_millis(10));
/// }
/// client.send_str("HELLO")?;
/// if let Some(reply) = client.wait_string(Duration::from_secs(1)) {
///     println!("{reply}");
/// }
/// client.close();
/// # Ok::<(), ipsocket_net::NetworkError>(())
/// ```
pub struct TcpClient {
    config: Mutex<TcpClientConfig>,
    shared: Arc<Shared>,
    outbox: Outbox,
    worker: Mutex<Option<Worker>>,
}

impl TcpClient {
    /// Create a new TCP client with the given configuration.
    pub fn new(config: TcpClientConfig) -> Self {
        Self {
            config: Mutex::new(config),
            shared: Arc::new(Shared::new(Role::Client)),
            outbox: Outbox::default(),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> TcpClientConfig {
        self.config.lock().clone()
    }

    /// Replace the configuration. Takes effect at the next `open`.
    pub fn set_config(&self, config: TcpClientConfig) {
        *self.config.lock() = config;
    }

    pub fn signals(&self) -> &TransceiverSignals {
        &self.shared.signals
    }

    /// Signal emitted when the connection is established.
    pub fn connected(&self) -> &Signal<ConnectionInfo> {
        &self.shared.signals.connected
    }

    /// Signal emitted when the connection ends or a connect attempt fails.
    pub fn disconnected(&self) -> &Signal<DisconnectReason> {
        &self.shared.signals.disconnected
    }

    /// Signal emitted after each packet is queued.
    pub fn received(&self) -> &Signal<()> {
        &self.shared.signals.received
    }

    /// Signal emitted when the lifecycle state changes.
    pub fn state_changed(&self) -> &Signal<TransceiverState> {
        &self.shared.signals.state_changed
    }

    /// Signal emitted when a session ends on an unexpected I/O error.
    pub fn error(&self) -> &Signal<NetworkError> {
        &self.shared.signals.error
    }

    /// Reason the last connection ended or the last attempt failed.
    pub fn disconnect_reason(&self) -> DisconnectReason {
        self.shared.status().reason
    }

    /// Fail with `AlreadyOpen` while the worker runs; forget it once it has
    /// stopped on its own.
    fn reap_finished(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if let Some(running) = worker.as_ref() {
            if !running.is_finished() {
                return Err(NetworkError::AlreadyOpen);
            }
            worker.take();
        }
        Ok(())
    }
}

impl Transceiver for TcpClient {
    fn open(&self, address: &str, port: u16) -> Result<()> {
        self.reap_finished()?;

        let remote = resolve_ipv4(address, port)?;
        let config = self.config();
        let runtime = build_runtime()?;

        // Slots run here, so the worker slot must not be locked yet.
        self.shared.reset();
        self.shared.set_endpoints(None, Some(remote));
        self.shared.set_state(TransceiverState::Opening);

        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(NetworkError::AlreadyOpen);
        }

        let cancel = CancellationToken::new();
        let task = run(
            self.shared.clone(),
            self.outbox.clone(),
            remote,
            config,
            cancel.clone(),
        );
        let span = tracing::info_span!(target: targets::TCP, span_names::TCP_CLIENT, %remote);

        let spawned = Worker::spawn(
            thread_name(span_names::TCP_CLIENT, remote),
            runtime,
            span,
            self.shared.clone(),
            cancel,
            task,
        );
        match spawned {
            Ok(spawned) => {
                *worker = Some(spawned);
                tracing::info!(target: targets::TCP, %remote, "client opened");
                Ok(())
            }
            Err(e) => {
                drop(worker);
                self.shared.set_state(TransceiverState::Closed);
                Err(e)
            }
        }
    }

    fn close(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        self.shared.set_state(TransceiverState::Closing);
        worker.stop();
        self.outbox.detach();
        self.shared.set_state(TransceiverState::Closed);
        tracing::info!(target: targets::TCP, "client closed");
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

impl PacketSender for TcpClient {
    /// Queue `data` for an immediate write on the current connection.
    ///
    /// Fails with `NotConnected` when no connection is established, and with
    /// `SendQueueFull` while the peer is not keeping up with earlier packets.
    fn send(&self, data: &[u8]) -> Result<()> {
        self.outbox.send(data)
    }
}

impl PacketReceiver for TcpClient {
    fn queue(&self) -> &PacketQueue {
        &self.shared.queue
    }

    fn polling_interval(&self) -> Duration {
        self.config.lock().polling_interval
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClient")
            .field("remote", &self.remote_addr())
            .field("state", &self.state())
            .finish()
    }
}

async fn connect(remote: SocketAddr, config: &TcpClientConfig) -> io::Result<TcpStream> {
    let socket = TcpSocket::new_v4()?;
    if let Some(port) = config.fixed_local_port {
        // The previous connection from this port may still be in TIME_WAIT.
        socket.set_reuseaddr(true)?;
        socket.bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))?;
    }
    match config.connect_timeout {
        Some(limit) => timeout(limit, socket.connect(remote))
            .await
            .unwrap_or_else(|_| Err(io::ErrorKind::TimedOut.into())),
        None => socket.connect(remote).await,
    }
}

async fn run(
    shared: Arc<Shared>,
    outbox: Outbox,
    remote: SocketAddr,
    config: TcpClientConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        shared.set_state(TransceiverState::Connecting);

        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = connect(remote, &config) => result,
        };

        match result {
            Ok(stream) => {
                attempt = 0;
                let reason = session::run(stream, &shared, &outbox, &config.socket, &cancel).await;
                shared.end_session(reason);
                if cancel.is_cancelled() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!(target: targets::TCP, error = %e, attempt, "connect failed");
                shared.connect_failed();
            }
        }

        let Some(reconnect) = &config.reconnect else {
            tracing::info!(target: targets::TCP, "single-shot client stopped");
            return;
        };

        if let Some(max) = reconnect.max_attempts
            && attempt >= max
        {
            tracing::warn!(target: targets::TCP, max, "max reconnection attempts reached");
            return;
        }

        let delay = reconnect.delay_for_attempt(attempt);
        attempt += 1;
        shared.set_state(TransceiverState::Connecting);
        tracing::debug!(target: targets::TCP, ?delay, attempt, "reconnecting");

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
