//! Single-client TCP server with signal-based event delivery.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ipsocket_core::Signal;
use ipsocket_core::logging::{span_names, targets, thread_name};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;

use super::config::TcpServerConfig;
use super::session::{self, Outbox};
use crate::error::{NetworkError, Result};
use crate::queue::PacketQueue;
use crate::resolve::resolve_ipv4;
use crate::shared::{Shared, TransceiverSignals};
use crate::state::{ConnectionInfo, DisconnectReason, Role, TransceiverState, TransceiverStatus};
use crate::transceiver::{PacketReceiver, PacketSender, Transceiver};
use crate::worker::{Worker, build_runtime};

/// Cancellation handle of the session in progress, if any.
type SessionSlot = Arc<Mutex<Option<CancellationToken>>>;

/// A TCP server that talks to one client at a time.
///
/// `open` binds and starts listening before it returns, so bind errors are
/// reported synchronously and `local_addr()` is known immediately, even when
/// port 0 asked the OS to pick one. The background thread accepts a client,
/// serves it until the session ends, and then accepts the next one. Further
/// clients wait in the listen backlog meanwhile.
///
/// # Signals
///
/// - [`connected`](Self::connected): a client was accepted
/// - [`disconnected`](Self::disconnected): the client session ended
/// - [`received`](Self::received): a packet was queued
/// - [`state_changed`](Self::state_changed): the lifecycle state changed
/// - [`error`](Self::error): the listener failed and the server stopped, or
///   a client session ended on an unexpected I/O error
pub struct TcpServer {
    config: Mutex<TcpServerConfig>,
    shared: Arc<Shared>,
    outbox: Outbox,
    session: SessionSlot,
    worker: Mutex<Option<Worker>>,
}

impl TcpServer {
    /// Create a new TCP server with the given configuration.
    pub fn new(config: TcpServerConfig) -> Self {
        Self {
            config: Mutex::new(config),
            shared: Arc::new(Shared::new(Role::Server)),
            outbox: Outbox::default(),
            session: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> TcpServerConfig {
        self.config.lock().clone()
    }

    /// Replace the configuration. Takes effect at the next `open`.
    pub fn set_config(&self, config: TcpServerConfig) {
        *self.config.lock() = config;
    }

    pub fn signals(&self) -> &TransceiverSignals {
        &self.shared.signals
    }

    pub fn connected(&self) -> &Signal<ConnectionInfo> {
        &self.shared.signals.connected
    }

    pub fn disconnected(&self) -> &Signal<DisconnectReason> {
        &self.shared.signals.disconnected
    }

    pub fn received(&self) -> &Signal<()> {
        &self.shared.signals.received
    }

    pub fn state_changed(&self) -> &Signal<TransceiverState> {
        &self.shared.signals.state_changed
    }

    pub fn error(&self) -> &Signal<NetworkError> {
        &self.shared.signals.error
    }

    /// Reason the last client session ended.
    pub fn disconnect_reason(&self) -> DisconnectReason {
        self.shared.status().reason
    }

    /// Drop the current client, if any, and keep listening.
    ///
    /// The session ends with `DisconnectReason::ByMe`. Returns `false` when no
    /// client is connected.
    pub fn disconnect_client(&self) -> bool {
        match self.session.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
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

    fn listen(addr: SocketAddr, config: &TcpServerConfig) -> Result<TcpListener> {
        let socket = TcpSocket::new_v4().map_err(|e| NetworkError::bind(addr, e))?;
        socket
            .set_reuseaddr(true)
            .map_err(|e| NetworkError::bind(addr, e))?;
        socket.bind(addr).map_err(|e| NetworkError::bind(addr, e))?;
        let listener = socket
            .listen(config.backlog.max(1))
            .map_err(|e| NetworkError::bind(addr, e))?;
        if let Err(e) = listener.set_ttl(config.ttl) {
            tracing::warn!(target: targets::TCP, error = %e, ttl = config.ttl, "failed to set TTL");
        }
        Ok(listener)
    }
}

impl Transceiver for TcpServer {
    fn open(&self, address: &str, port: u16) -> Result<()> {
        self.reap_finished()?;

        let bind_addr = resolve_ipv4(address, port)?;
        let config = self.config();
        let runtime = build_runtime()?;

        // The listener registers with the reactor of the runtime that is
        // entered while it is created.
        let listener = {
            let _guard = runtime.enter();
            Self::listen(bind_addr, &config)?
        };
        let local = listener.local_addr()?;

        // Slots run here, so the worker slot must not be locked yet.
        self.shared.reset();
        self.shared.set_endpoints(Some(local), None);
        self.shared.set_state(TransceiverState::Opening);

        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(NetworkError::AlreadyOpen);
        }

        let cancel = CancellationToken::new();
        let task = run(
            listener,
            self.shared.clone(),
            self.outbox.clone(),
            self.session.clone(),
            config,
            cancel.clone(),
        );
        let span = tracing::info_span!(target: targets::TCP, span_names::TCP_SERVER, %local);

        let spawned = Worker::spawn(
            thread_name(span_names::TCP_SERVER, local),
            runtime,
            span,
            self.shared.clone(),
            cancel,
            task,
        );
        match spawned {
            Ok(spawned) => {
                *worker = Some(spawned);
                tracing::info!(target: targets::TCP, %local, "server listening");
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
        self.session.lock().take();
        self.shared.set_state(TransceiverState::Closed);
        tracing::info!(target: targets::TCP, "server closed");
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

impl PacketSender for TcpServer {
    /// Queue `data` for an immediate write to the current client.
    ///
    /// Fails with `NotConnected` when no client is connected, and with
    /// `SendQueueFull` while the peer is not keeping up with earlier packets.
    fn send(&self, data: &[u8]) -> Result<()> {
        self.outbox.send(data)
    }
}

impl PacketReceiver for TcpServer {
    fn queue(&self) -> &PacketQueue {
        &self.shared.queue
    }

    fn polling_interval(&self) -> Duration {
        self.config.lock().polling_interval
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServer")
            .field("local", &self.local_addr())
            .field("state", &self.state())
            .finish()
    }
}

/// Errors from `accept` that concern one pending client, not the listener.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

async fn run(
    listener: TcpListener,
    shared: Arc<Shared>,
    outbox: Outbox,
    session_slot: SessionSlot,
    config: TcpServerConfig,
    cancel: CancellationToken,
) {
    loop {
        shared.set_state(TransceiverState::Listening);

        let accepted = tokio::select! {
            _ = cancel.cancelled() => return,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                tracing::debug!(target: targets::TCP, %peer, "client accepted");
                let session_cancel = cancel.child_token();
                *session_slot.lock() = Some(session_cancel.clone());

                let reason =
                    session::run(stream, &shared, &outbox, &config.socket, &session_cancel).await;

                session_slot.lock().take();
                shared.end_session(reason);
                if cancel.is_cancelled() {
                    return;
                }
            }
            Err(e) if is_transient(&e) => {
                tracing::debug!(target: targets::TCP, error = %e, "accept failed, still listening");
            }
            Err(e) => {
                tracing::error!(target: targets::TCP, error = %e, "listener failed");
                shared.fault(e.into());
                return;
            }
        }
    }
}
