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

//! Accepts new connections and arms read readiness on them.

use std::io::ErrorKind;
use std::net::SocketAddr;

use mio::net::TcpListener;
use mio::Interest;

use crate::connection::ConnectionData;
use crate::dispatcher::Shared;

/// Drains every connection currently pending on `listener`, registering each
/// with the event dispatcher and inserting it into the shared connection
/// table. Returns once `accept` would block.
///
/// Any connection whose peer address is not IPv4, or which cannot be
/// registered with the event dispatcher, is dropped: the OS handle is
/// closed and no record is created.
pub(crate) fn accept_all(listener: &mut TcpListener, shared: &Shared) {
    loop {
        match listener.accept() {
            Ok((mut stream, addr)) => {
                let peer = match addr {
                    SocketAddr::V4(v4) => v4,
                    SocketAddr::V6(_) => {
                        tracing::debug!(%addr, "rejecting non-IPv4 peer");
                        continue;
                    }
                };

                let result = shared.table.try_insert_with(|token| {
                    shared
                        .registry
                        .register(&mut stream, token, Interest::READABLE)?;
                    Ok::<_, std::io::Error>(ConnectionData::new(token, peer, stream))
                });

                match result {
                    Ok(connection) => {
                        tracing::debug!(
                            peer = %connection.peer(),
                            handle = connection.handle().0,
                            "accepted connection"
                        );
                    }
                    Err(error) => {
                        tracing::warn!(%peer, %error, "failed to register accepted connection");
                    }
                }
            }
            Err(error) if error.kind() == ErrorKind::WouldBlock => return,
            Err(error) => {
                tracing::warn!(%error, "transient accept failure");
                return;
            }
        }
    }
}
