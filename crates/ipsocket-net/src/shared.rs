//! State shared between a transceiver handle and its background thread.

use std::net::SocketAddr;

use ipsocket_core::Signal;
use parking_lot::Mutex;

use crate::error::NetworkError;
use crate::queue::PacketQueue;
use crate::state::{ConnectionInfo, DisconnectReason, Role, TransceiverState, TransceiverStatus};

/// The signals every transceiver emits.
///
/// Slots run on the thread that emits: the caller's thread for changes made
/// by `open`/`close`, the background network thread for everything else.
///
/// # Signals
///
/// - `connected`: a TCP session was established
/// - `disconnected`: a TCP session ended or a connect attempt failed
/// - `received`: one packet was appended to the queue
/// - `state_changed`: the lifecycle state changed
/// - `error`: an unexpected fault: a TCP listener failure that stopped the
///   server, or a session I/O error that ended a connection with
///   `DisconnectReason::Failed`. The UDP transceivers never emit it.
#[derive(Debug, Default)]
pub struct TransceiverSignals {
    pub connected: Signal<ConnectionInfo>,
    pub disconnected: Signal<DisconnectReason>,
    pub received: Signal<()>,
    pub state_changed: Signal<TransceiverState>,
    pub error: Signal<NetworkError>,
}

#[derive(Debug, Default)]
struct StatusFields {
    state: TransceiverState,
    reason: DisconnectReason,
    local: Option<SocketAddr>,
    remote: Option<SocketAddr>,
}

#[derive(Debug)]
pub(crate) struct Shared {
    role: Role,
    fields: Mutex<StatusFields>,
    pub(crate) queue: PacketQueue,
    pub(crate) signals: TransceiverSignals,
}

impl Shared {
    pub(crate) fn new(role: Role) -> Self {
        Self {
            role,
            fields: Mutex::new(StatusFields::default()),
            queue: PacketQueue::new(),
            signals: TransceiverSignals::default(),
        }
    }

    pub(crate) fn state(&self) -> TransceiverState {
        self.fields.lock().state
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.fields.lock().local
    }

    pub(crate) fn remote_addr(&self) -> Option<SocketAddr> {
        self.fields.lock().remote
    }

    pub(crate) fn status(&self) -> TransceiverStatus {
        let fields = self.fields.lock();
        TransceiverStatus {
            role: self.role,
            state: fields.state,
            reason: fields.reason,
            local: fields.local,
            remote: fields.remote,
        }
    }

    /// Change the state, emitting `state_changed` only on an actual change.
    pub(crate) fn set_state(&self, state: TransceiverState) {
        let changed = {
            let mut fields = self.fields.lock();
            std::mem::replace(&mut fields.state, state) != state
        };
        if changed {
            self.signals.state_changed.emit(state);
        }
    }

    pub(crate) fn set_endpoints(&self, local: Option<SocketAddr>, remote: Option<SocketAddr>) {
        let mut fields = self.fields.lock();
        fields.local = local;
        fields.remote = remote;
    }

    pub(crate) fn set_remote(&self, remote: SocketAddr) {
        self.fields.lock().remote = Some(remote);
    }

    /// Reset everything but the endpoints for a fresh `open`.
    pub(crate) fn reset(&self) {
        self.fields.lock().reason = DisconnectReason::None;
        self.queue.clear();
    }

    /// Record a new session, clear stale packets and emit `connected`.
    pub(crate) fn begin_session(&self, info: ConnectionInfo) {
        {
            let mut fields = self.fields.lock();
            fields.local = Some(info.local);
            fields.remote = Some(info.remote);
            fields.reason = DisconnectReason::None;
        }
        self.queue.clear();
        self.set_state(TransceiverState::Connected);
        self.signals.connected.emit(info);
    }

    /// Record the end of a session and emit `disconnected`.
    pub(crate) fn end_session(&self, reason: DisconnectReason) {
        self.fields.lock().reason = reason;
        self.set_state(TransceiverState::Disconnected);
        self.signals.disconnected.emit(reason);
    }

    /// Record a failed connect attempt and emit `disconnected(Failed)`.
    pub(crate) fn connect_failed(&self) {
        self.fields.lock().reason = DisconnectReason::Failed;
        self.signals.disconnected.emit(DisconnectReason::Failed);
    }

    /// Enqueue a packet, then emit `received`.
    pub(crate) fn deliver(&self, packet: Vec<u8>) {
        self.queue.push(packet);
        self.signals.received.emit(());
    }

    pub(crate) fn fault(&self, err: NetworkError) {
        self.signals.error.emit(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_state_changed_only_on_change() {
        let shared = Shared::new(Role::Client);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        shared.signals.state_changed.connect(move |s| seen_clone.lock().push(*s));

        shared.set_state(TransceiverState::Connecting);
        shared.set_state(TransceiverState::Connecting);
        shared.set_state(TransceiverState::Closed);

        assert_eq!(
            *seen.lock(),
            vec![TransceiverState::Connecting, TransceiverState::Closed]
        );
    }

    #[test]
    fn test_session_lifecycle() {
        let shared = Shared::new(Role::Server);
        shared.queue.push(b"stale".to_vec());

        let info = ConnectionInfo {
            local: "127.0.0.1:5000".parse().unwrap(),
            remote: "127.0.0.1:40000".parse().unwrap(),
        };
        shared.begin_session(info);
        assert!(shared.queue.is_empty());
        assert_eq!(shared.status().state, TransceiverState::Connected);
        assert_eq!(shared.remote_addr(), Some(info.remote));

        shared.deliver(b"x".to_vec());
        assert_eq!(shared.queue.len(), 1);

        shared.end_session(DisconnectReason::ByHim);
        let status = shared.status();
        assert_eq!(status.state, TransceiverState::Disconnected);
        assert_eq!(status.reason, DisconnectReason::ByHim);
    }
}
