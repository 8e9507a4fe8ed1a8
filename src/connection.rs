// Copyright 2026 The Pulsewire Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-connection state: exactly one record per live handle.

use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use mio::net::TcpStream;
use mio::Token;

/// One live connection's state.
///
/// Created by the Acceptor, registered in the [`crate::table::ConnectionTable`]
/// under `handle`, and mutated only by: its Reader (while holding
/// `read_lock`), the Liveness scanner (reading `last_heartbeat` and `peer`),
/// and teardown.
#[derive(Debug)]
pub struct ConnectionData {
    handle: Token,
    peer: SocketAddrV4,
    stream: Mutex<TcpStream>,
    last_heartbeat: Mutex<SystemTime>,
    /// Serializes Readers for this connection. Held for the duration of one
    /// readiness event's handling.
    read_lock: Mutex<()>,
    tombstoned: AtomicBool,
}

impl ConnectionData {
    /// Creates a record for a freshly accepted connection. `last_heartbeat`
    /// is initialized to the current time.
    pub fn new(handle: Token, peer: SocketAddrV4, stream: TcpStream) -> Self {
        Self {
            handle,
            peer,
            stream: Mutex::new(stream),
            last_heartbeat: Mutex::new(SystemTime::now()),
            read_lock: Mutex::new(()),
            tombstoned: AtomicBool::new(false),
        }
    }

    /// The opaque handle this record is keyed by in the connection table.
    pub fn handle(&self) -> Token {
        self.handle
    }

    /// The remote endpoint captured at accept time.
    pub fn peer(&self) -> SocketAddrV4 {
        self.peer
    }

    /// Refreshes `last_heartbeat` to now. Called by the Reader on observing
    /// a `KEEP_ALIVE` message. Monotonic per connection, since wall-clock
    /// time only moves forward between successive calls in practice.
    pub fn touch_heartbeat(&self) {
        *self.last_heartbeat.lock().unwrap() = SystemTime::now();
    }

    /// How long it has been since the last heartbeat was observed.
    pub fn heartbeat_age(&self) -> Duration {
        SystemTime::now()
            .duration_since(*self.last_heartbeat.lock().unwrap())
            .unwrap_or_default()
    }

    /// True once teardown has begun. Readers observing this must abandon
    /// work on the handle without touching any other field.
    pub fn is_tombstoned(&self) -> bool {
        self.tombstoned.load(Ordering::Acquire)
    }

    /// Marks this record as tombstoned. Must be called before the owning
    /// teardown releases `read_lock`.
    pub fn tombstone(&self) {
        self.tombstoned.store(true, Ordering::Release);
    }

    /// Attempts to acquire this connection's read lock without blocking.
    /// `None` means another reader is currently active; the caller should
    /// return and let the next readiness event retry.
    pub fn try_read_lock(&self) -> Option<std::sync::MutexGuard<'_, ()>> {
        self.read_lock.try_lock().ok()
    }

    /// Runs `f` with exclusive access to the underlying stream. Callers
    /// should hold this for the shortest span that correctness allows; the
    /// frame-drain loop holds it for an entire readiness event so repeated
    /// single-byte reads don't re-lock per byte.
    pub fn with_stream<T>(&self, f: impl FnOnce(&mut TcpStream) -> T) -> T {
        f(&mut self.stream.lock().unwrap())
    }

    /// Builds a record for tests that need a table entry but no real network
    /// traffic. Wires up a genuine loopback `TcpStream` pair internally (so
    /// `with_stream` and registry operations still behave like a real
    /// connection) but lets the caller pick the stored `peer` address
    /// independently of the loopback pair's actual address, since `peer` is
    /// captured once at accept time and never re-queried from the socket.
    #[cfg(test)]
    pub(crate) fn for_test(handle: Token, peer: SocketAddrV4) -> Self {
        use std::net::TcpListener as StdTcpListener;
        use std::net::TcpStream as StdTcpStream;

        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = StdTcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        client.set_nonblocking(true).unwrap();
        server.set_nonblocking(true).unwrap();
        // Keep the client side alive for the server stream's lifetime by
        // leaking it; tests only exercise the server side.
        std::mem::forget(client);

        Self::new(handle, peer, TcpStream::from_std(server))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::thread::sleep;

    fn token() -> Token {
        Token(0)
    }

    fn peer() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 4242)
    }

    #[test]
    fn starts_untombstoned_with_fresh_heartbeat() {
        let data = ConnectionData::for_test(token(), peer());
        assert!(!data.is_tombstoned());
        assert!(data.heartbeat_age() < Duration::from_secs(1));
    }

    #[test]
    fn touch_heartbeat_resets_age() {
        let data = ConnectionData::for_test(token(), peer());
        sleep(Duration::from_millis(20));
        let aged = data.heartbeat_age();
        data.touch_heartbeat();
        assert!(data.heartbeat_age() < aged);
    }

    #[test]
    fn read_lock_cannot_be_acquired_twice_concurrently() {
        let data = ConnectionData::for_test(token(), peer());
        let _first = data.try_read_lock().unwrap();
        assert!(data.try_read_lock().is_none());
    }

    #[test]
    fn tombstone_is_observable_and_sticky() {
        let data = ConnectionData::for_test(token(), peer());
        data.tombstone();
        assert!(data.is_tombstoned());
    }
}
