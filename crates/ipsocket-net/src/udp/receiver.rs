//! UDP receiver with a background receive loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ipsocket_core::Signal;
use ipsocket_core::logging::{span_names, targets, thread_name};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::config::UdpReceiverConfig;
use crate::error::{NetworkError, Result};
use crate::queue::PacketQueue;
use crate::resolve::resolve_ipv4;
use crate::shared::{Shared, TransceiverSignals};
use crate::state::{Role, TransceiverState, TransceiverStatus};
use crate::transceiver::{PacketReceiver, Transceiver};
use crate::worker::{Worker, build_runtime};

/// Receives datagrams on a local endpoint and queues them.
///
/// `open(address, port)` binds `address:port` (use `"0.0.0.0"` for every
/// interface and port 0 for an OS-assigned port) and starts a background
/// thread that queues each datagram and emits `received`. The endpoint of the
/// most recent sender is available as `remote_addr()`.
///
/// Receive errors are logged and otherwise ignored; the loop keeps running
/// until `close()`.
pub struct UdpReceiver {
    config: Mutex<UdpReceiverConfig>,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl UdpReceiver {
    pub fn new(config: UdpReceiverConfig) -> Self {
        Self {
            config: Mutex::new(config),
            shared: Arc::new(Shared::new(Role::Server)),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> UdpReceiverConfig {
        self.config.lock().clone()
    }

    /// Replace the configuration. Takes effect at the next `open`.
    pub fn set_config(&self, config: UdpReceiverConfig) {
        *self.config.lock() = config;
    }

    pub fn signals(&self) -> &TransceiverSignals {
        &self.shared.signals
    }

    pub fn received(&self) -> &Signal<()> {
        &self.shared.signals.received
    }

    pub fn state_changed(&self) -> &Signal<TransceiverState> {
        &self.shared.signals.state_changed
    }

    fn bind(addr: SocketAddr, config: &UdpReceiverConfig) -> Result<UdpSocket> {
        let socket = std::net::UdpSocket::bind(addr).map_err(|e| NetworkError::bind(addr, e))?;
        socket.set_broadcast(config.broadcast)?;
        socket.set_nonblocking(true)?;
        Ok(UdpSocket::from_std(socket)?)
    }
}

impl Transceiver for UdpReceiver {
    fn open(&self, address: &str, port: u16) -> Result<()> {
        if self.worker.lock().is_some() {
            return Err(NetworkError::AlreadyOpen);
        }

        let bind_addr = resolve_ipv4(address, port)?;
        let config = self.config();
        let runtime = build_runtime()?;
        let socket = {
            let _guard = runtime.enter();
            Self::bind(bind_addr, &config)?
        };
        let local = socket.local_addr()?;

        // Slots run here, so the worker slot must not be locked yet.
        self.shared.reset();
        self.shared.set_endpoints(Some(local), None);
        self.shared.set_state(TransceiverState::Listening);

        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(NetworkError::AlreadyOpen);
        }

        let cancel = CancellationToken::new();
        let task = run(socket, self.shared.clone(), config, cancel.clone());
        let span = tracing::info_span!(target: targets::UDP, span_names::UDP_RECEIVER, %local);

        let spawned = Worker::spawn(
            thread_name(span_names::UDP_RECEIVER, local),
            runtime,
            span,
            self.shared.clone(),
            cancel,
            task,
        );
        match spawned {
            Ok(spawned) => {
                *worker = Some(spawned);
                tracing::info!(target: targets::UDP, %local, "receiver opened");
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
        self.shared.set_state(TransceiverState::Closed);
        tracing::info!(target: targets::UDP, "receiver closed");
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

impl PacketReceiver for UdpReceiver {
    fn queue(&self) -> &PacketQueue {
        &self.shared.queue
    }

    fn polling_interval(&self) -> Duration {
        self.config.lock().polling_interval
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for UdpReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpReceiver")
            .field("local", &self.local_addr())
            .field("state", &self.state())
            .finish()
    }
}

async fn run(
    socket: UdpSocket,
    shared: Arc<Shared>,
    config: UdpReceiverConfig,
    cancel: CancellationToken,
) {
    let mut buffer = vec![0u8; config.recv_buffer_size.max(1)];

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = socket.recv_from(&mut buffer) => result,
        };

        match result {
            Ok((n, source)) => {
                tracing::trace!(target: targets::UDP, len = n, %source, "datagram received");
                shared.set_remote(source);
                shared.deliver(buffer[..n].to_vec());
            }
            Err(e) => {
                tracing::debug!(target: targets::UDP, error = %e, "receive failed, ignoring");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(config.polling_interval) => {}
                }
            }
        }
    }
}
