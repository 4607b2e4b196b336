//! UDP sender and receiver transceivers.
//!
//! - **UdpSender**: fires best-effort datagrams at one remote endpoint
//! - **UdpReceiver**: binds a local endpoint and queues every datagram it
//!   receives, remembering the last sender as its remote endpoint
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ipsocket_net::udp::{UdpReceiver, UdpReceiverConfig, UdpSender, UdpSenderConfig};
//! use ipsocket_net::{PacketReceiver, PacketSender, Transceiver};
//!
//! let receiver = UdpReceiver::new(UdpReceiverConfig::new());
//! receiver.open("0.0.0.0", 5001)?;
//!
//! let sender = UdpSender::new(UdpSenderConfig::new());
//! sender.open("127.0.0.1", 5001)?;
//! sender.send_str("PING")?;
//!
//! assert_eq!(receiver.wait_string(Duration::from_secs(1)).as_deref(), Some("PING"));
//! # Ok::<(), ipsocket_net::NetworkError>(())
//! ```
//!
//! # Broadcast Example
//!
//! ```no_run
//! use ipsocket_net::udp::{UdpSender, UdpSenderConfig};
//! use ipsocket_net::{PacketSender, Transceiver};
//!
//! let sender = UdpSender::new(UdpSenderConfig::new().broadcast(true));
//! sender.open("255.255.255.255", 5001)?;
//! sender.send(b"Discovery")?;
//! # Ok::<(), ipsocket_net::NetworkError>(())
//! ```

mod config;
mod receiver;
mod sender;

pub use config::{DEFAULT_RECV_BUFFER_SIZE, UdpReceiverConfig, UdpSenderConfig};
pub use receiver::UdpReceiver;
pub use sender::UdpSender;
