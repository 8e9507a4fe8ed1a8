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

//! The connection table: a slab-keyed map from handle to connection record.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use mio::Token;
use slab::Slab;

use crate::connection::ConnectionData;

/// Mapping from `Token` (the opaque connection handle) to its
/// [`ConnectionData`], owning every record's lifetime.
///
/// All operations serialize on a single table-wide mutex, except
/// [`ConnectionTable::try_for_each`], which the Liveness scanner uses to
/// skip a scan outright rather than block on a busy table.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    inner: Mutex<Slab<Arc<ConnectionData>>>,
}

impl ConnectionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a fresh `Token`, builds the record with it via `build`, and
    /// inserts it atomically under the table lock.
    ///
    /// Because the token comes from `Slab::vacant_entry` and is committed in
    /// the same locked operation that builds the record, no other accept
    /// can ever observe or reuse the same token first — the "duplicate
    /// handle" failure mode is structurally unreachable here rather than
    /// merely checked. If `build` fails (e.g. it could not arm read
    /// readiness), nothing is inserted and the token is released back to
    /// the slab.
    pub fn try_insert_with<E>(
        &self,
        build: impl FnOnce(Token) -> Result<ConnectionData, E>,
    ) -> Result<Arc<ConnectionData>, E> {
        let mut slab = self.inner.lock().unwrap();
        let entry = slab.vacant_entry();
        let token = Token(entry.key());
        let data = Arc::new(build(token)?);
        entry.insert(data.clone());
        Ok(data)
    }

    /// Looks up a connection by handle.
    pub fn lookup(&self, handle: Token) -> Option<Arc<ConnectionData>> {
        self.inner.lock().unwrap().get(handle.0).cloned()
    }

    /// Removes and returns a connection record, the authoritative
    /// destruction point for a connection. Returns `None` if it was already
    /// removed (e.g. by a concurrent teardown that won the race).
    pub fn remove(&self, handle: Token) -> Option<Arc<ConnectionData>> {
        let mut slab = self.inner.lock().unwrap();
        if slab.contains(handle.0) {
            Some(slab.remove(handle.0))
        } else {
            None
        }
    }

    /// Invokes `visit` on every record, using `try_lock`: if the table is
    /// already locked elsewhere, this returns `false` immediately instead of
    /// blocking, so the caller can skip this scan.
    pub fn try_for_each(&self, mut visit: impl FnMut(&Arc<ConnectionData>)) -> bool {
        match self.inner.try_lock() {
            Ok(slab) => {
                for (_, connection) in slab.iter() {
                    visit(connection);
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Snapshot of every currently connected peer's address, taken under the
    /// table lock. Backs `get_connected_list`.
    pub fn snapshot_peers(&self) -> Vec<Ipv4Addr> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(_, connection)| *connection.peer().ip())
            .collect()
    }

    /// Removes every record, returning them all. Used by `stop_server` to
    /// destroy every connection before the table itself is dropped.
    pub fn drain(&self) -> Vec<Arc<ConnectionData>> {
        let mut slab = self.inner.lock().unwrap();
        let drained = slab.drain().collect();
        slab.clear();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn socket_for(octet: u8) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, octet), 9000)
    }

    #[test]
    fn insert_then_lookup_roundtrips() {
        let table = ConnectionTable::new();
        let inserted = table
            .try_insert_with(|token| Ok::<_, ()>(ConnectionData::for_test(token, socket_for(1))))
            .unwrap();

        let found = table.lookup(inserted.handle()).unwrap();
        assert_eq!(found.peer(), socket_for(1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_destroys_the_record_and_shrinks_the_table() {
        let table = ConnectionTable::new();
        let inserted = table
            .try_insert_with(|token| Ok::<_, ()>(ConnectionData::for_test(token, socket_for(2))))
            .unwrap();

        let removed = table.remove(inserted.handle());
        assert!(removed.is_some());
        assert!(table.lookup(inserted.handle()).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn drain_removes_every_record_and_returns_them_all() {
        let table = ConnectionTable::new();
        for octet in 1..=3u8 {
            table
                .try_insert_with(|token| {
                    Ok::<_, ()>(ConnectionData::for_test(token, socket_for(octet)))
                })
                .unwrap();
        }

        let drained = table.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(table.len(), 0);
        assert!(table.snapshot_peers().is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let table = ConnectionTable::new();
        let inserted = table
            .try_insert_with(|token| Ok::<_, ()>(ConnectionData::for_test(token, socket_for(3))))
            .unwrap();

        assert!(table.remove(inserted.handle()).is_some());
        assert!(table.remove(inserted.handle()).is_none());
    }

    #[test]
    fn failed_build_leaves_no_record_behind() {
        let table = ConnectionTable::new();
        let result = table.try_insert_with(|_token| Err::<ConnectionData, _>("arm failed"));

        assert!(result.is_err());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn snapshot_peers_reflects_every_live_connection() {
        let table = ConnectionTable::new();
        for octet in 1..=3u8 {
            table
                .try_insert_with(|token| {
                    Ok::<_, ()>(ConnectionData::for_test(token, socket_for(octet)))
                })
                .unwrap();
        }

        let mut peers = table.snapshot_peers();
        peers.sort();
        assert_eq!(
            peers,
            vec![
                Ipv4Addr::new(127, 0, 0, 1),
                Ipv4Addr::new(127, 0, 0, 2),
                Ipv4Addr::new(127, 0, 0, 3),
            ]
        );
    }

    #[test]
    fn concurrent_inserts_all_land_with_distinct_handles() {
        use std::sync::Arc as StdArc;
        use std::thread;

        let table = StdArc::new(ConnectionTable::new());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let table = StdArc::clone(&table);
                thread::spawn(move || {
                    table
                        .try_insert_with(|token| {
                            Ok::<_, ()>(ConnectionData::for_test(token, socket_for(i)))
                        })
                        .unwrap()
                        .handle()
                })
            })
            .collect();

        let mut tokens: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        tokens.sort_by_key(|t| t.0);
        tokens.dedup();
        assert_eq!(tokens.len(), 8);
        assert_eq!(table.len(), 8);
    }
}
