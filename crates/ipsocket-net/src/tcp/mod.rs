//! TCP client and server transceivers.
//!
//! Both sides share the same session model: each read from the peer becomes
//! one packet in the transceiver's queue, sends are handed to the session and
//! written immediately, and every session ends with a [`DisconnectReason`].
//!
//! - **TcpClient**: connects to a server, reconnecting with exponential
//!   backoff unless configured as single-shot
//! - **TcpServer**: listens and serves one client at a time
//!
//! # Client Example
//!
//! ```no_run
//! use ipsocket_net::tcp::{ReconnectConfig, TcpClient, TcpClientConfig};
//! use ipsocket_net::Transceiver;
//! use std::time::Duration;
//!
//! let config = TcpClientConfig::new()
//!     .no_delay(true)
//!     .reconnect_config(ReconnectConfig::new().initial_delay(Duration::from_millis(500)));
//!
//! let client = TcpClient::new(config);
//! client.disconnected().connect(|reason| println!("{}", reason.description()));
//! client.open("192.168.0.10", 5000)?;
//! # Ok::<(), ipsocket_net::NetworkError>(())
//! ```
//!
//! # Server Example
//!
//! ```no_run
//! use ipsocket_net::tcp::{TcpServer, TcpServerConfig};
//! use ipsocket_net::{PacketReceiver, PacketSender, Transceiver};
//! use std::time::Duration;
//!
//! let server = TcpServer::new(TcpServerConfig::new());
//! server.open("0.0.0.0", 5000)?;
//!
//! if let Some(request) = server.wait_string(Duration::from_secs(10)) {
//!     server.send_str(&request.to_uppercase())?;
//! }
//! server.close();
//! # Ok::<(), ipsocket_net::NetworkError>(())
//! ```
//!
//! [`DisconnectReason`]: crate::DisconnectReason

mod client;
mod config;
mod server;
mod session;

pub use client::TcpClient;
pub use config::{
    DEFAULT_POLLING_INTERVAL, DEFAULT_READ_BUFFER_SIZE, DEFAULT_SEND_QUEUE_CAPACITY,
    ReconnectConfig, TcpClientConfig, TcpServerConfig, TcpSocketConfig,
};
pub use server::TcpServer;
