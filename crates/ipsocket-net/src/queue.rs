//! FIFO of received packets shared between a network thread and consumers.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A thread-safe FIFO of inbound packets.
///
/// Cloning yields another handle to the same queue. The background thread of
/// a transceiver pushes; any thread may pop.
#[derive(Clone, Debug, Default)]
pub struct PacketQueue {
    packets: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet at the tail.
    pub fn push(&self, packet: Vec<u8>) {
        self.packets.lock().push_back(packet);
    }

    /// Remove and return the oldest packet, or `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<Vec<u8>> {
        self.packets.lock().pop_front()
    }

    /// Drop every queued packet.
    pub fn clear(&self) {
        self.packets.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.lock().is_empty()
    }

    /// Pop the oldest packet, sleep-polling every `interval` until one
    /// arrives or `timeout` has elapsed.
    ///
    /// Returns `None` no earlier than `timeout` after the call and, apart from
    /// scheduling jitter, no later than `timeout + interval`.
    pub fn wait(&self, timeout: Duration, interval: Duration) -> Option<Vec<u8>> {
        let start = Instant::now();
        loop {
            if let Some(packet) = self.try_pop() {
                return Some(packet);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return None;
            }
            std::thread::sleep(interval.min(timeout - elapsed).max(Duration::from_millis(1)));
        }
    }
}
