use std::net::{Ipv4Addr, SocketAddrV4};
use std::thread::sleep;
use std::time::Duration;

use pulsewire::{start_server, Config};

fn main() {
    tracing_subscriber::fmt::init();

    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 7878);
    start_server(addr, Config::default()).expect("failed to start server");
    tracing::info!(%addr, "listening");

    loop {
        match pulsewire::read_message() {
            Some(item) => {
                tracing::info!(peer = %item.peer, kind = ?item.kind, "delivered item");
                pulsewire::free_bufferitem(item);
            }
            None => sleep(Duration::from_millis(50)),
        }
    }
}
