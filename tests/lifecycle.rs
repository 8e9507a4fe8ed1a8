use std::io::Write;
use std::net::{Ipv4Addr, SocketAddrV4, TcpStream};
use std::sync::Mutex;
use std::thread::sleep;
use std::time::Duration;

use pulsewire::{free_bufferitem, get_connected_list, start_server, stop_server, BufferItemKind, Config};

// `start_server`/`stop_server` operate on one process-wide instance, and
// every #[test] function in this file runs in the same process, so they
// must not run concurrently with each other.
static SERIAL: Mutex<()> = Mutex::new(());

fn free_addr() -> SocketAddrV4 {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)
}

fn settle() {
    sleep(Duration::from_millis(100));
}

#[test]
fn a_single_payload_is_delivered_once() {
    let _serial = SERIAL.lock().unwrap();
    let addr = free_addr();
    start_server(addr, Config::default()).unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(br#"{"type":"ORDER","id":1}"#).unwrap();
    settle();

    let item = pulsewire::read_message().expect("payload should be delivered");
    assert_eq!(item.kind, BufferItemKind::Payload);
    assert_eq!(item.peer, Ipv4Addr::LOCALHOST);
    assert!(pulsewire::read_message().is_none());

    free_bufferitem(item);
    drop(client);
    stop_server();
}

#[test]
fn two_objects_written_back_to_back_are_both_delivered() {
    let _serial = SERIAL.lock().unwrap();
    let addr = free_addr();
    start_server(addr, Config::default()).unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    // One write, two complete frames: the dispatcher's edge-triggered
    // readiness event for this socket must drain both before returning,
    // or the second would sit unseen until more bytes arrive.
    client
        .write_all(br#"{"type":"A"}{"type":"B"}"#)
        .unwrap();
    settle();

    let first = pulsewire::read_message().expect("first payload");
    let second = pulsewire::read_message().expect("second payload");
    assert_eq!(first.kind, BufferItemKind::Payload);
    assert_eq!(second.kind, BufferItemKind::Payload);
    assert!(pulsewire::read_message().is_none());

    free_bufferitem(first);
    free_bufferitem(second);
    drop(client);
    stop_server();
}

#[test]
fn keep_alive_messages_are_absorbed_and_never_delivered() {
    let _serial = SERIAL.lock().unwrap();
    let addr = free_addr();
    start_server(addr, Config::default()).unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(br#"{"type":"KEEP_ALIVE"}"#).unwrap();
    settle();

    assert!(pulsewire::read_message().is_none());

    drop(client);
    stop_server();
}

#[test]
fn malformed_bytes_produce_a_software_error_and_close_the_connection() {
    let _serial = SERIAL.lock().unwrap();
    let addr = free_addr();
    start_server(addr, Config::default()).unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    // An opening brace with no matching close: the frame reader can never
    // resolve this into a complete object, and nothing more arrives. The
    // peer-closed peek probe sees these buffered bytes before it sees EOF,
    // so the drain loop always runs and always hits this object's
    // unresolved brace, never the close itself — the outcome is
    // deterministically a software error, not a connection-closed report.
    client.write_all(b"{\"type\":\"X\"").unwrap();
    drop(client);
    settle();

    let item = pulsewire::read_message().expect("a report should be delivered");
    assert!(matches!(item.kind, BufferItemKind::SoftwareError { .. }));

    free_bufferitem(item);
    stop_server();
}

#[test]
fn an_abrupt_close_with_no_data_reports_connection_closed() {
    let _serial = SERIAL.lock().unwrap();
    let addr = free_addr();
    start_server(addr, Config::default()).unwrap();

    let client = TcpStream::connect(addr).unwrap();
    drop(client);
    settle();

    let item = pulsewire::read_message().expect("a closure report should be delivered");
    assert_eq!(item.kind, BufferItemKind::ConnectionClosed);

    free_bufferitem(item);
    stop_server();
}

#[test]
fn a_stale_heartbeat_is_reported_without_closing_the_connection() {
    let _serial = SERIAL.lock().unwrap();
    let addr = free_addr();
    let config = Config {
        keep_alive_interval: Duration::from_millis(20),
        keep_alive_check_period: 1,
        keep_alive_prod: Duration::from_millis(20),
        ..Config::default()
    };
    start_server(addr, config).unwrap();

    let client = TcpStream::connect(addr).unwrap();
    sleep(Duration::from_millis(200));

    let item = pulsewire::read_message().expect("a timeout report should be delivered");
    assert_eq!(item.kind, BufferItemKind::ConnectionTimeout);
    // Reporting a timeout must not tear the connection down: it should
    // still show up as connected afterward.
    assert_eq!(get_connected_list(), vec![Ipv4Addr::LOCALHOST]);

    free_bufferitem(item);
    drop(client);
    stop_server();
}

#[test]
fn multiple_concurrent_connections_each_get_their_own_handle() {
    let _serial = SERIAL.lock().unwrap();
    let addr = free_addr();
    start_server(addr, Config::default()).unwrap();

    let clients: Vec<_> = (0..4).map(|_| TcpStream::connect(addr).unwrap()).collect();
    settle();

    assert_eq!(get_connected_list().len(), clients.len());

    drop(clients);
    stop_server();
}
