//! Tests for TCP client and server functionality.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ipsocket_net::tcp::{
    ReconnectConfig, TcpClient, TcpClientConfig, TcpServer, TcpServerConfig, TcpSocketConfig,
};
use ipsocket_net::{
    ConnectionInfo, DisconnectReason, NetworkError, PacketPayload, PacketReceiver, PacketSender,
    Transceiver, TransceiverState,
};
use ipsocket_core::Signal;
use parking_lot::Mutex;

const WAIT: Duration = Duration::from_secs(5);

/// Poll `cond` every few milliseconds until it holds or `limit` elapses.
fn wait_until(limit: Duration, cond: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn quick_reconnect() -> ReconnectConfig {
    ReconnectConfig::new()
        .initial_delay(Duration::from_millis(50))
        .max_delay(Duration::from_millis(200))
}

fn start_server(config: TcpServerConfig) -> TcpServer {
    let server = TcpServer::new(config);
    server.open("127.0.0.1", 0).unwrap();
    assert_eq!(server.state(), TransceiverState::Listening);
    server
}

fn connect_client(server: &TcpServer, config: TcpClientConfig) -> TcpClient {
    let client = TcpClient::new(config);
    client.open("127.0.0.1", server.local_port()).unwrap();
    assert!(wait_until(WAIT, || client.is_connected() && server.is_connected()));
    client
}

/// A port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn record_reasons(signal: &Signal<DisconnectReason>) -> Arc<Mutex<Vec<DisconnectReason>>> {
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let reasons_clone = reasons.clone();
    signal.connect(move |reason| reasons_clone.lock().push(*reason));
    reasons
}

#[test]
fn test_socket_config_builder() {
    let config = TcpSocketConfig::new()
        .no_delay(true)
        .read_buffer_size(4096)
        .read_timeout(Duration::from_secs(30))
        .write_timeout(Duration::from_secs(10));

    assert!(config.no_delay);
    assert_eq!(config.read_buffer_size, 4096);
    assert_eq!(config.read_timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.write_timeout, Some(Duration::from_secs(10)));
}

#[test]
fn test_config_defaults() {
    let client = TcpClientConfig::default();
    assert_eq!(client.connect_timeout, Some(Duration::from_millis(5000)));
    assert_eq!(client.socket.read_buffer_size, 1500);
    assert_eq!(client.socket.send_queue_capacity, 64);
    assert_eq!(client.polling_interval, Duration::from_millis(20));
    assert!(client.reconnect.is_some());
    assert!(client.single_shot().reconnect.is_none());

    let server = TcpServerConfig::default();
    assert_eq!(server.ttl, 255);
    assert_eq!(server.backlog, 1);
    assert_eq!(server.socket.read_timeout, None);
}

#[test]
fn test_reconnect_config_builder() {
    let config = ReconnectConfig::new()
        .max_attempts(5)
        .initial_delay(Duration::from_millis(500))
        .max_delay(Duration::from_secs(30))
        .backoff_multiplier(1.5);

    assert_eq!(config.max_attempts, Some(5));
    assert_eq!(config.initial_delay, Duration::from_millis(500));
    assert_eq!(config.max_delay, Duration::from_secs(30));
    assert_eq!(config.backoff_multiplier, 1.5);
}

#[test]
fn test_client_initial_state() {
    let client = TcpClient::new(TcpClientConfig::new());

    assert_eq!(client.state(), TransceiverState::Closed);
    assert!(!client.is_open());
    assert!(!client.is_connected());
    assert_eq!(client.remote_addr(), None);
    assert_eq!(client.local_port(), 0);
    assert_eq!(client.send(b"test data"), Err(NetworkError::NotConnected));
    assert_eq!(client.get_bytes(), None);
    assert_eq!(client.status().to_string(), "Stopped");
}

#[test]
fn test_unresolvable_address() {
    let client = TcpClient::new(TcpClientConfig::new());
    let err = client.open("no-such-host.invalid", 5000).unwrap_err();
    assert!(matches!(err, NetworkError::AddressResolution(_)));
    assert!(!client.is_open());
}

#[test]
fn test_hello_world_exchange() {
    let server = start_server(TcpServerConfig::new());

    let server_info: Arc<Mutex<Option<ConnectionInfo>>> = Arc::new(Mutex::new(None));
    let server_info_clone = server_info.clone();
    server.connected().connect(move |info| {
        *server_info_clone.lock() = Some(*info);
    });

    let client = TcpClient::new(TcpClientConfig::new().no_delay(true));
    let client_info: Arc<Mutex<Option<ConnectionInfo>>> = Arc::new(Mutex::new(None));
    let client_info_clone = client_info.clone();
    client.connected().connect(move |info| {
        *client_info_clone.lock() = Some(*info);
    });

    client.open("127.0.0.1", server.local_port()).unwrap();
    assert!(wait_until(WAIT, || client.is_connected() && server.is_connected()));
    assert!(wait_until(WAIT, || server_info.lock().is_some()));

    let client_info = client_info.lock().expect("client connected");
    let server_info = server_info.lock().expect("server connected");
    assert_eq!(client_info.remote, server_info.local);
    assert_eq!(client_info.local, server_info.remote);
    assert_eq!(client.remote_addr(), Some(client_info.remote));
    assert_eq!(server.remote_port(), client.local_port());

    client.send_str("HELLO").unwrap();
    assert_eq!(server.wait_string(WAIT).as_deref(), Some("HELLO"));

    server.send_packet(&PacketPayload::from("WORLD")).unwrap();
    assert_eq!(client.wait_string(WAIT).as_deref(), Some("WORLD"));

    client.close();
    server.close();
}

#[test]
fn test_client_close_reasons() {
    let server = start_server(TcpServerConfig::new());
    let server_reasons = record_reasons(server.disconnected());

    let client = connect_client(&server, TcpClientConfig::new());
    let client_reasons = record_reasons(client.disconnected());

    client.close();
    assert_eq!(client.state(), TransceiverState::Closed);
    assert_eq!(*client_reasons.lock(), vec![DisconnectReason::ByMe]);
    assert_eq!(client.disconnect_reason(), DisconnectReason::ByMe);

    assert!(wait_until(WAIT, || !server_reasons.lock().is_empty()));
    assert_eq!(*server_reasons.lock(), vec![DisconnectReason::ByHim]);

    // The server goes back to waiting for the next client.
    assert!(wait_until(WAIT, || server.state() == TransceiverState::Listening));
    server.close();
}

#[test]
fn test_server_disconnect_client_and_reconnect() {
    let server = start_server(TcpServerConfig::new());
    let connections = Arc::new(AtomicUsize::new(0));
    let connections_clone = connections.clone();
    server.connected().connect(move |_| {
        connections_clone.fetch_add(1, Ordering::SeqCst);
    });
    let server_reasons = record_reasons(server.disconnected());

    let client = connect_client(&server, TcpClientConfig::new().reconnect_config(quick_reconnect()));
    let client_reasons = record_reasons(client.disconnected());

    assert!(server.disconnect_client());
    assert!(wait_until(WAIT, || !client_reasons.lock().is_empty()));
    assert_eq!(client_reasons.lock()[0], DisconnectReason::ByHim);
    assert!(wait_until(WAIT, || !server_reasons.lock().is_empty()));
    assert_eq!(server_reasons.lock()[0], DisconnectReason::ByMe);
    assert!(server.is_open());

    // The client dials again and the server accepts it.
    assert!(wait_until(WAIT, || connections.load(Ordering::SeqCst) == 2));
    assert!(wait_until(WAIT, || client.is_connected()));

    client.send(b"again").unwrap();
    assert_eq!(server.wait_bytes(WAIT), Some(b"again".to_vec()));

    client.close();
    server.close();
    assert!(!server.disconnect_client());
}

#[test]
fn test_single_shot_connect_failure() {
    let client = TcpClient::new(TcpClientConfig::new().single_shot());
    let reasons = record_reasons(client.disconnected());

    client.open("127.0.0.1", closed_port()).unwrap();

    assert!(wait_until(WAIT, || !reasons.lock().is_empty()));
    assert_eq!(*reasons.lock(), vec![DisconnectReason::Failed]);
    assert!(wait_until(WAIT, || client.state() == TransceiverState::Closed));
    assert_eq!(client.disconnect_reason(), DisconnectReason::Failed);

    // A stopped client can be opened again.
    client.open("127.0.0.1", closed_port()).unwrap();
    client.close();
}

#[test]
fn test_reconnect_reports_each_failure() {
    let config = TcpClientConfig::new().reconnect_config(
        ReconnectConfig::new()
            .initial_delay(Duration::from_millis(20))
            .max_delay(Duration::from_millis(20))
            .max_attempts(2),
    );
    let client = TcpClient::new(config);
    let reasons = record_reasons(client.disconnected());

    client.open("127.0.0.1", closed_port()).unwrap();

    assert!(wait_until(WAIT, || client.state() == TransceiverState::Closed));
    assert_eq!(*reasons.lock(), vec![DisconnectReason::Failed; 3]);
}

#[test]
fn test_close_interrupts_reconnect_delay() {
    let config = TcpClientConfig::new()
        .reconnect_config(ReconnectConfig::new().initial_delay(Duration::from_secs(30)));
    let client = TcpClient::new(config);
    let reasons = record_reasons(client.disconnected());

    client.open("127.0.0.1", closed_port()).unwrap();
    assert!(wait_until(WAIT, || !reasons.lock().is_empty()));
    assert_eq!(client.state(), TransceiverState::Connecting);

    let start = Instant::now();
    client.close();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(client.state(), TransceiverState::Closed);
}

#[test]
fn test_server_read_timeout() {
    let server = start_server(TcpServerConfig::new().alive_timeout(Duration::from_millis(150)));
    let server_reasons = record_reasons(server.disconnected());

    let client = connect_client(&server, TcpClientConfig::new().single_shot());
    let client_reasons = record_reasons(client.disconnected());

    assert!(wait_until(WAIT, || !server_reasons.lock().is_empty()));
    assert_eq!(server_reasons.lock()[0], DisconnectReason::Timeout);

    assert!(wait_until(WAIT, || !client_reasons.lock().is_empty()));
    assert_eq!(client_reasons.lock()[0], DisconnectReason::ByHim);

    client.close();
    server.close();
}

#[test]
fn test_read_timeout_with_outbound_traffic() {
    let server = start_server(TcpServerConfig::new());
    let config = TcpClientConfig::new()
        .single_shot()
        .alive_timeout(Duration::from_millis(300));
    let client = TcpClient::new(config);
    let reasons = record_reasons(client.disconnected());
    client.open("127.0.0.1", server.local_port()).unwrap();
    assert!(wait_until(WAIT, || client.is_connected()));

    // The server takes every poll but never answers.
    let start = Instant::now();
    while reasons.lock().is_empty() && start.elapsed() < WAIT {
        let _ = client.send_str("POLL");
        std::thread::sleep(Duration::from_millis(100));
    }

    assert_eq!(reasons.lock().first(), Some(&DisconnectReason::Timeout));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(server.pending() > 0);

    client.close();
    server.close();
}

#[test]
fn test_close_during_stalled_write() {
    // A peer that accepts and then never reads.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = TcpClientConfig::new()
        .single_shot()
        .socket_config(TcpSocketConfig::new().send_queue_capacity(4));
    let client = Arc::new(TcpClient::new(config));
    client.open("127.0.0.1", port).unwrap();
    let (_peer, _) = listener.accept().unwrap();
    assert!(wait_until(WAIT, || client.is_connected()));

    let chunk = vec![0u8; 1 << 20];
    let mut refused = false;
    for _ in 0..256 {
        match client.send(&chunk) {
            Ok(()) => {}
            Err(NetworkError::SendQueueFull) => {
                refused = true;
                break;
            }
            Err(e) => panic!("unexpected send error: {e}"),
        }
    }
    assert!(refused);

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let closer = client.clone();
    std::thread::spawn(move || {
        closer.close();
        let _ = done_tx.send(());
    });

    assert!(
        done_rx.recv_timeout(Duration::from_secs(2)).is_ok(),
        "close() blocked behind a stalled write"
    );
    assert_eq!(client.state(), TransceiverState::Closed);
    assert_eq!(client.disconnect_reason(), DisconnectReason::ByMe);
}

#[test]
fn test_state_slot_may_close_during_open() {
    let server = start_server(TcpServerConfig::new());
    let client = Arc::new(TcpClient::new(TcpClientConfig::new().single_shot()));

    let weak = Arc::downgrade(&client);
    client.state_changed().connect(move |state| {
        if *state == TransceiverState::Opening
            && let Some(client) = weak.upgrade()
        {
            client.close();
        }
    });

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let opener = client.clone();
    let port = server.local_port();
    std::thread::spawn(move || {
        let _ = done_tx.send(opener.open("127.0.0.1", port));
    });

    let opened = done_rx.recv_timeout(Duration::from_secs(2));
    assert_eq!(opened, Ok(Ok(())), "open() blocked while a slot called close()");
    assert!(wait_until(WAIT, || server.is_connected()));

    client.close();
    assert_eq!(client.state(), TransceiverState::Closed);
    server.close();
}

#[test]
fn test_received_signal_matches_queue() {
    let server = start_server(TcpServerConfig::new());
    let received = Arc::new(AtomicUsize::new(0));
    let received_clone = received.clone();
    server.received().connect(move |()| {
        received_clone.fetch_add(1, Ordering::SeqCst);
    });

    let client = connect_client(&server, TcpClientConfig::new().no_delay(true));
    for i in 0..3u8 {
        client.send(&[i]).unwrap();
        assert!(wait_until(WAIT, || received.load(Ordering::SeqCst) == usize::from(i) + 1));
    }

    assert_eq!(server.pending(), 3);
    assert_eq!(server.get_bytes(), Some(vec![0]));
    assert_eq!(server.get_packet().map(|p| p.get_byte(0)), Some(1));
    assert_eq!(server.get_bytes(), Some(vec![2]));
    assert_eq!(server.get_bytes(), None);

    client.close();
    server.close();
}

#[test]
fn test_wait_timeout_bounds() {
    let server = start_server(TcpServerConfig::new());
    let client = connect_client(&server, TcpClientConfig::new());

    let timeout = Duration::from_millis(100);
    let start = Instant::now();
    assert_eq!(client.wait_bytes(timeout), None);
    let elapsed = start.elapsed();

    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + client.polling_interval() + Duration::from_millis(200));

    client.close();
    server.close();
}

#[test]
fn test_open_twice_fails() {
    let server = start_server(TcpServerConfig::new());
    assert_eq!(server.open("127.0.0.1", 0), Err(NetworkError::AlreadyOpen));

    let client = TcpClient::new(TcpClientConfig::new());
    client.open("127.0.0.1", server.local_port()).unwrap();
    assert_eq!(
        client.open("127.0.0.1", server.local_port()),
        Err(NetworkError::AlreadyOpen)
    );

    client.close();
    server.close();
}

#[test]
fn test_server_reopen_after_close() {
    let server = start_server(TcpServerConfig::new());
    server.close();
    assert!(!server.is_open());

    server.open("127.0.0.1", 0).unwrap();
    assert_ne!(server.local_port(), 0);
    let client = connect_client(&server, TcpClientConfig::new());
    assert!(client.is_connected());

    client.close();
    server.close();
}

#[test]
fn test_server_close_disconnects_client() {
    let server = start_server(TcpServerConfig::new());
    let server_reasons = record_reasons(server.disconnected());
    let client = connect_client(&server, TcpClientConfig::new().single_shot());
    let client_reasons = record_reasons(client.disconnected());

    server.close();
    assert_eq!(*server_reasons.lock(), vec![DisconnectReason::ByMe]);
    assert_eq!(server.state(), TransceiverState::Closed);

    assert!(wait_until(WAIT, || !client_reasons.lock().is_empty()));
    assert_eq!(client_reasons.lock()[0], DisconnectReason::ByHim);
    client.close();
}

#[test]
fn test_status_while_connected() {
    let server = start_server(TcpServerConfig::new());
    let client = connect_client(&server, TcpClientConfig::new());

    let status = server.status();
    assert_eq!(status.state, TransceiverState::Connected);
    assert_eq!(
        status.to_string(),
        format!("Connected: remote 127.0.0.1 port {}", client.local_port())
    );

    let status = client.status();
    assert_eq!(
        status.to_string(),
        format!("Connected: local 127.0.0.1 port {}", client.local_port())
    );

    client.close();
    server.close();
}

#[test]
fn test_state_changes_are_reported() {
    let server = start_server(TcpServerConfig::new());
    let client = TcpClient::new(TcpClientConfig::new());
    let states = Arc::new(Mutex::new(Vec::new()));
    let states_clone = states.clone();
    client.state_changed().connect(move |s| states_clone.lock().push(*s));

    client.open("127.0.0.1", server.local_port()).unwrap();
    assert!(wait_until(WAIT, || client.is_connected()));
    client.close();

    let states = states.lock().clone();
    assert_eq!(states.first(), Some(&TransceiverState::Opening));
    assert!(states.contains(&TransceiverState::Connecting));
    assert!(states.contains(&TransceiverState::Connected));
    assert_eq!(states.last(), Some(&TransceiverState::Closed));
    server.close();
}

#[test]
fn test_set_config_applies_on_next_open() {
    let client = TcpClient::new(TcpClientConfig::new());
    client.set_config(client.config().polling_interval(Duration::from_millis(5)));
    assert_eq!(client.polling_interval(), Duration::from_millis(5));
    assert_eq!(client.config().polling_interval, Duration::from_millis(5));
}
