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

//! Drives reads on a single connection in reaction to a readiness event.

use std::io::ErrorKind;
use std::sync::Arc;

use mio::net::TcpStream;
use mio::Token;

use crate::connection::ConnectionData;
use crate::dispatcher::Shared;
use crate::frame::{read_frame, FrameOutcome};
use crate::message::Message;
use crate::queue::BufferItem;

/// Handles one read-readiness event for `handle`.
///
/// Stale-event lookup, read-lock contention check, tombstone check,
/// peer-closed probe, then a frame-drain loop that classifies each decoded
/// object as a heartbeat (liveness-only) or a payload, until the connection
/// goes quiet or fails.
pub(crate) fn on_readable(shared: &Shared, handle: Token) {
    let Some(connection) = shared.table.lookup(handle) else {
        // Stale event: the connection was already torn down.
        return;
    };

    let Some(_read_guard) = connection.try_read_lock() else {
        // Another reader is already active; the next readiness event retries.
        return;
    };

    if connection.is_tombstoned() {
        return;
    }

    if peer_has_closed(&connection) {
        shared.queue.push(BufferItem::connection_closed(
            *connection.peer().ip(),
        ));
        teardown(shared, &connection);
        return;
    }

    if let Some(reason) = drain_frames(shared, &connection) {
        shared
            .queue
            .push(BufferItem::software_error(*connection.peer().ip(), reason));
        teardown(shared, &connection);
    }
}

/// One-byte `MSG_PEEK`-style probe: `Ok(0)` or any error other than
/// `WouldBlock` means the peer closed (or the descriptor otherwise can no
/// longer be read from).
fn peer_has_closed(connection: &ConnectionData) -> bool {
    let mut probe = [0u8; 1];
    connection.with_stream(|stream| match stream.peek(&mut probe) {
        Ok(0) => true,
        Ok(_) => false,
        Err(error) if error.kind() == ErrorKind::WouldBlock => false,
        Err(_) => true,
    })
}

/// Repeatedly invokes the frame reader until it reports `WouldBlock`
/// (nothing more is currently available) or a protocol error. Looping here,
/// rather than returning after one frame, is required because `mio`'s
/// readiness notifications are edge-triggered: a single event can have more
/// than one complete object already sitting in the kernel receive buffer.
///
/// Returns `Some(reason)` on a protocol error, `None` once exhausted
/// cleanly.
fn drain_frames(shared: &Shared, connection: &Arc<ConnectionData>) -> Option<String> {
    connection.with_stream(|stream: &mut TcpStream| loop {
        match read_frame(stream) {
            FrameOutcome::Complete(bytes) => {
                classify_and_enqueue(shared, connection, &bytes);
            }
            FrameOutcome::WouldBlock => return None,
            FrameOutcome::ProtocolError => {
                return Some("partial or malformed JSON frame".to_string());
            }
        }
    })
}

fn classify_and_enqueue(shared: &Shared, connection: &ConnectionData, bytes: &[u8]) {
    match Message::decode(bytes) {
        Ok(message) if message.is_keep_alive() => {
            connection.touch_heartbeat();
        }
        Ok(message) => {
            shared
                .queue
                .push(BufferItem::payload(*connection.peer().ip(), message));
        }
        Err(error) => {
            tracing::debug!(peer = %connection.peer(), %error, "could not decode message");
            shared.queue.push(BufferItem::software_error(
                *connection.peer().ip(),
                "Could not decode message",
            ));
        }
    }
}

/// Tombstones, removes from the table, and deregisters/closes the
/// connection, in that order, so no observer can act on a handle whose
/// resources are being released.
fn teardown(shared: &Shared, connection: &Arc<ConnectionData>) {
    connection.tombstone();
    shared.table.remove(connection.handle());
    connection.with_stream(|stream| {
        if let Err(error) = shared.registry.deregister(stream) {
            tracing::debug!(peer = %connection.peer(), %error, "deregister failed during teardown");
        }
    });
    tracing::debug!(peer = %connection.peer(), handle = connection.handle().0, "connection torn down");
}
