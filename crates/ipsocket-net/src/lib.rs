//! TCP and UDP transceivers for ipsocket.
//!
//! This crate provides ready-made endpoints for talking to devices and
//! services over raw TCP and UDP:
//!
//! - **UdpSender / UdpReceiver**: best-effort datagrams to one endpoint, and a
//!   bound endpoint that queues everything it receives
//! - **TcpClient**: one connection to a server, with automatic reconnect
//! - **TcpServer**: accepts one client at a time
//! - **PacketPayload**: byte-level codec for building and parsing packets
//!
//! Every receiving transceiver runs its network I/O on a background thread
//! and stores each received packet in a FIFO queue. Application code either
//! reacts to signals or pulls packets with the non-blocking `get_*` and the
//! timed `wait_*` methods of [`PacketReceiver`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ipsocket_net::payload::{ascii, PacketPayload};
//! use ipsocket_net::tcp::{TcpClient, TcpClientConfig};
//! use ipsocket_net::{PacketReceiver, PacketSender, Transceiver};
//!
//! let client = TcpClient::new(TcpClientConfig::new());
//! client.open("192.168.0.10", 5000)?;
//!
//! let mut request = PacketPayload::zeroed(6);
//! request.set_byte(0, ascii::STX);
//! request.set_hex(1, 2, 0x31);
//! request.set_byte(3, ascii::ETX);
//! request.set_hex(4, 2, request.sum(0, 4) as i32);
//! client.send_packet(&request)?;
//!
//! if let Some(reply) = client.wait_packet(Duration::from_secs(1)) {
//!     println!("status: {:?}", reply.get_hex(1, 2));
//! }
//! client.close();
//! # Ok::<(), ipsocket_net::NetworkError>(())
//! ```
//!
//! # Logging
//!
//! Events are emitted through `tracing` with the targets in
//! [`ipsocket_core::logging::targets`]; install a subscriber to see them.

mod error;
pub mod payload;
mod queue;
mod resolve;
mod shared;
mod state;
pub mod tcp;
mod transceiver;
pub mod udp;
mod worker;

pub use error::{NetworkError, Result};
pub use payload::{Endian, PacketPayload};
pub use queue::PacketQueue;
pub use resolve::resolve_ipv4;
pub use shared::TransceiverSignals;
pub use state::{ConnectionInfo, DisconnectReason, Role, TransceiverState, TransceiverStatus};
pub use transceiver::{PacketReceiver, PacketSender, Transceiver};
