//! Traits shared by every transceiver.

use std::net::SocketAddr;
use std::time::Duration;

use crate::Result;
use crate::payload::{PacketPayload, ascii_to_string, string_to_ascii};
use crate::queue::PacketQueue;
use crate::state::{TransceiverState, TransceiverStatus};

/// Open/close lifecycle common to all transceivers.
pub trait Transceiver {
    /// Resolve `address`, set up the socket and start any background work.
    ///
    /// Fails with [`NetworkError::AlreadyOpen`](crate::NetworkError::AlreadyOpen)
    /// if the transceiver is open.
    fn open(&self, address: &str, port: u16) -> Result<()>;

    /// Stop background work and release the socket. A no-op when closed.
    ///
    /// When this returns the background thread has exited; no further
    /// packets are queued and no further signals are emitted.
    fn close(&self);

    fn state(&self) -> TransceiverState;

    fn status(&self) -> TransceiverStatus;

    fn local_addr(&self) -> Option<SocketAddr>;

    fn remote_addr(&self) -> Option<SocketAddr>;

    fn is_open(&self) -> bool {
        self.state().is_open()
    }

    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Local IP as text, empty when unknown.
    fn local_address(&self) -> String {
        self.local_addr().map(|a| a.ip().to_string()).unwrap_or_default()
    }

    /// Local port, 0 when unknown.
    fn local_port(&self) -> u16 {
        self.local_addr().map_or(0, |a| a.port())
    }

    /// Remote IP as text, empty when unknown.
    fn remote_address(&self) -> String {
        self.remote_addr().map(|a| a.ip().to_string()).unwrap_or_default()
    }

    /// Remote port, 0 when unknown.
    fn remote_port(&self) -> u16 {
        self.remote_addr().map_or(0, |a| a.port())
    }
}

/// Outbound packets.
pub trait PacketSender {
    /// Send raw bytes as one datagram or one TCP write.
    fn send(&self, data: &[u8]) -> Result<()>;

    /// Send the ASCII encoding of `text` (non-ASCII characters become `?`).
    fn send_str(&self, text: &str) -> Result<()> {
        self.send(&string_to_ascii(text))
    }

    fn send_packet(&self, packet: &PacketPayload) -> Result<()> {
        self.send(packet.data())
    }
}

/// Inbound packets, served from the transceiver's [`PacketQueue`].
///
/// The `get_*` methods never block. The `wait_*` methods sleep-poll the queue
/// every [`polling_interval`](Self::polling_interval) until a packet arrives
/// or the timeout elapses.
pub trait PacketReceiver {
    fn queue(&self) -> &PacketQueue;

    fn polling_interval(&self) -> Duration;

    fn get_bytes(&self) -> Option<Vec<u8>> {
        self.queue().try_pop()
    }

    fn get_string(&self) -> Option<String> {
        self.get_bytes().map(|b| ascii_to_string(&b))
    }

    fn get_packet(&self) -> Option<PacketPayload> {
        self.get_bytes().map(PacketPayload::new)
    }

    fn wait_bytes(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.queue().wait(timeout, self.polling_interval())
    }

    fn wait_string(&self, timeout: Duration) -> Option<String> {
        self.wait_bytes(timeout).map(|b| ascii_to_string(&b))
    }

    fn wait_packet(&self, timeout: Duration) -> Option<PacketPayload> {
        self.wait_bytes(timeout).map(PacketPayload::new)
    }

    /// Number of packets waiting in the queue.
    fn pending(&self) -> usize {
        self.queue().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Loopback {
        queue: PacketQueue,
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl PacketSender for Loopback {
        fn send(&self, data: &[u8]) -> Result<()> {
            self.sent.lock().push(data.to_vec());
            self.queue.push(data.to_vec());
            Ok(())
        }
    }

    impl PacketReceiver for Loopback {
        fn queue(&self) -> &PacketQueue {
            &self.queue
        }

        fn polling_interval(&self) -> Duration {
            Duration::from_millis(5)
        }
    }

    #[test]
    fn test_default_methods() {
        let lb = Loopback {
            queue: PacketQueue::new(),
            sent: Mutex::new(Vec::new()),
        };

        lb.send_str("héllo").unwrap();
        lb.send_packet(&PacketPayload::new(vec![0x41, 0xFF])).unwrap();
        assert_eq!(lb.sent.lock()[0], b"h?llo");
        assert_eq!(lb.pending(), 2);

        assert_eq!(lb.get_string().as_deref(), Some("h?llo"));
        assert_eq!(lb.wait_string(Duration::from_millis(10)).as_deref(), Some("A?"));
        assert_eq!(lb.get_packet(), None);
        assert_eq!(lb.wait_bytes(Duration::from_millis(10)), None);
    }
}
