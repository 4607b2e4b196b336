//! One established TCP session: the read loop, queued writes and the
//! classification of how the session ended.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ipsocket_core::logging::targets;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep, sleep};
use tokio_util::sync::CancellationToken;

use super::config::TcpSocketConfig;
use crate::error::{NetworkError, Result};
use crate::shared::Shared;
use crate::state::{ConnectionInfo, DisconnectReason};

/// Sending half of the current session's write queue; `None` between
/// sessions.
#[derive(Clone, Debug, Default)]
pub(crate) struct Outbox {
    tx: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
}

impl Outbox {
    /// Hand `data` to the session for an immediate write.
    ///
    /// Never waits: a full queue is reported as `SendQueueFull`.
    pub(crate) fn send(&self, data: &[u8]) -> Result<()> {
        let tx = self.tx.lock();
        let tx = tx.as_ref().ok_or(NetworkError::NotConnected)?;
        tx.try_send(data.to_vec()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NetworkError::SendQueueFull,
            mpsc::error::TrySendError::Closed(_) => NetworkError::NotConnected,
        })
    }

    fn attach(&self, tx: mpsc::Sender<Vec<u8>>) {
        *self.tx.lock() = Some(tx);
    }

    pub(crate) fn detach(&self) {
        self.tx.lock().take();
    }
}

/// Map the I/O error that ended a session to a disconnect reason.
pub(crate) fn classify(err: &io::Error) -> DisconnectReason {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => DisconnectReason::Timeout,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::WriteZero => DisconnectReason::ByHim,
        _ => DisconnectReason::Failed,
    }
}

/// Classify `err`, reporting it on the `error` signal when it is not one of
/// the ordinary ways a connection ends.
fn fail(shared: &Shared, op: &str, err: io::Error) -> DisconnectReason {
    let reason = classify(&err);
    if reason == DisconnectReason::Failed {
        tracing::warn!(target: targets::TCP, error = %err, op, "session failed");
        shared.fault(err.into());
    } else {
        tracing::debug!(target: targets::TCP, error = %err, op, "session I/O ended");
    }
    reason
}

/// A timer that fires `limit` after the last [`restart`]; never fires when
/// `limit` is `None`.
fn deadline(limit: Option<Duration>) -> Sleep {
    sleep(limit.unwrap_or(Duration::MAX))
}

fn restart(timer: std::pin::Pin<&mut Sleep>, limit: Option<Duration>) {
    if let Some(limit) = limit {
        timer.reset(Instant::now() + limit);
    }
}

/// Write as much of the unsent tail of `pending` as the socket takes.
async fn write_some<W>(writer: &mut W, pending: &Option<(Vec<u8>, usize)>) -> io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    match pending {
        Some((data, written)) => writer.write(&data[*written..]).await,
        None => std::future::pending().await,
    }
}

/// Drive a session over `stream` until it ends, and return why it ended.
///
/// Records the endpoints, clears the queue and emits `connected` before the
/// first read. The caller emits `disconnected` with the returned reason.
pub(crate) async fn run(
    stream: TcpStream,
    shared: &Shared,
    outbox: &Outbox,
    config: &TcpSocketConfig,
    cancel: &CancellationToken,
) -> DisconnectReason {
    if let Err(e) = stream.set_nodelay(config.no_delay) {
        tracing::warn!(target: targets::TCP, error = %e, "failed to set TCP_NODELAY");
    }

    let info = match (stream.local_addr(), stream.peer_addr()) {
        (Ok(local), Ok(remote)) => ConnectionInfo { local, remote },
        (Err(e), _) | (_, Err(e)) => {
            tracing::debug!(target: targets::TCP, error = %e, "peer vanished before the session started");
            return classify(&e);
        }
    };

    let (tx, rx) = mpsc::channel(config.send_queue_capacity.max(1));
    outbox.attach(tx);
    tracing::info!(target: targets::TCP, local = %info.local, remote = %info.remote, "session established");
    shared.begin_session(info);

    let (reader, writer) = stream.into_split();
    let reason = pump(reader, writer, rx, shared, config, cancel).await;

    outbox.detach();
    tracing::info!(target: targets::TCP, remote = %info.remote, reason = %reason, "session ended");
    reason
}

/// Service reads and writes concurrently until the session ends.
///
/// The read timeout counts from the last completed read and is not affected
/// by outbound traffic. The write timeout counts from the last progress of
/// the packet being written. Cancellation is honored even while a write is
/// stalled on a full send buffer.
async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    mut rx: mpsc::Receiver<Vec<u8>>,
    shared: &Shared,
    config: &TcpSocketConfig,
    cancel: &CancellationToken,
) -> DisconnectReason
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; config.read_buffer_size.max(1)];
    // Packet being written and how many of its bytes are already out.
    let mut pending: Option<(Vec<u8>, usize)> = None;

    let read_deadline = deadline(config.read_timeout);
    let write_deadline = deadline(config.write_timeout);
    tokio::pin!(read_deadline, write_deadline);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                if pending.is_none() {
                    let _ = writer.shutdown().await;
                }
                return DisconnectReason::ByMe;
            }

            () = &mut read_deadline, if config.read_timeout.is_some() => {
                tracing::debug!(target: targets::TCP, "no data within the read timeout");
                return DisconnectReason::Timeout;
            }

            () = &mut write_deadline, if pending.is_some() && config.write_timeout.is_some() => {
                tracing::debug!(target: targets::TCP, "write stalled past the write timeout");
                return DisconnectReason::Timeout;
            }

            result = write_some(&mut writer, &pending), if pending.is_some() => {
                let n = match result {
                    Ok(0) => return fail(shared, "write", io::ErrorKind::WriteZero.into()),
                    Ok(n) => n,
                    Err(e) => return fail(shared, "write", e),
                };
                if let Some((data, written)) = pending.as_mut() {
                    *written += n;
                    if *written < data.len() {
                        restart(write_deadline.as_mut(), config.write_timeout);
                        continue;
                    }
                    tracing::trace!(target: targets::TCP, len = data.len(), "packet sent");
                }
                pending = None;
            }

            cmd = rx.recv(), if pending.is_none() => {
                let Some(data) = cmd else {
                    return DisconnectReason::ByMe;
                };
                if !data.is_empty() {
                    restart(write_deadline.as_mut(), config.write_timeout);
                    pending = Some((data, 0));
                }
            }

            result = reader.read(&mut buffer) => {
                match result {
                    Ok(0) => return DisconnectReason::ByHim,
                    Ok(n) => {
                        restart(read_deadline.as_mut(), config.read_timeout);
                        tracing::trace!(target: targets::TCP, len = n, "packet received");
                        shared.deliver(buffer[..n].to_vec());
                    }
                    Err(e) => return fail(shared, "read", e),
                }
            }
        }
    }
}
