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

//! The single process-wide delivery queue and its entries.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::message::Message;

/// What kind of event a [`BufferItem`] reports.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferItemKind {
    /// A non-heartbeat message decoded from a connection.
    Payload,
    /// A decode failure or a framing protocol error.
    SoftwareError {
        /// Human-readable reason, also embedded in `message`.
        reason: String,
    },
    /// The peer closed its end of the connection (or a terminal read error
    /// was observed in its place).
    ConnectionClosed,
    /// The connection's last heartbeat is older than `keep_alive_prod`.
    ConnectionTimeout,
}

/// One entry in the delivery queue.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferItem {
    /// What happened.
    pub kind: BufferItemKind,
    /// Address of the connection this item originated from. Unspecified
    /// (`0.0.0.0`) for items synthesized without a peer.
    pub peer: Ipv4Addr,
    /// Wall-clock time this item was enqueued.
    pub recv_time: SystemTime,
    /// The decoded payload for `Payload`; a synthesized software-error
    /// message for every other kind.
    pub message: Message,
}

impl BufferItem {
    /// Builds the item for a successfully decoded, non-heartbeat message.
    pub fn payload(peer: Ipv4Addr, message: Message) -> Self {
        Self {
            kind: BufferItemKind::Payload,
            peer,
            recv_time: SystemTime::now(),
            message,
        }
    }

    /// Builds a `SoftwareError` item, synthesizing its message.
    pub fn software_error(peer: Ipv4Addr, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            message: Message::software_error(reason.clone()),
            kind: BufferItemKind::SoftwareError { reason },
            peer,
            recv_time: SystemTime::now(),
        }
    }

    /// Builds a `ConnectionClosed` item.
    pub fn connection_closed(peer: Ipv4Addr) -> Self {
        Self {
            kind: BufferItemKind::ConnectionClosed,
            peer,
            recv_time: SystemTime::now(),
            message: Message::software_error("Connection closed"),
        }
    }

    /// Builds a `ConnectionTimeout` item.
    pub fn connection_timeout(peer: Ipv4Addr) -> Self {
        Self {
            kind: BufferItemKind::ConnectionTimeout,
            peer,
            recv_time: SystemTime::now(),
            message: Message::software_error("Connection timed out"),
        }
    }
}

/// Single process-wide FIFO of [`BufferItem`]s.
///
/// `push`/`pop` serialize on the queue's mutex; `try_push` is for callers
/// (the Liveness scanner) that must never block on a contended queue.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    inner: Mutex<VecDeque<BufferItem>>,
}

impl DeliveryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `item` to the tail. Never blocks except to acquire the
    /// queue's mutex.
    pub fn push(&self, item: BufferItem) {
        self.inner.lock().unwrap().push_back(item);
    }

    /// Appends `item` unless the queue is already locked by another writer,
    /// in which case `item` is handed back so the caller can skip this
    /// round rather than block.
    pub fn try_push(&self, item: BufferItem) -> Result<(), BufferItem> {
        match self.inner.try_lock() {
            Ok(mut queue) => {
                queue.push_back(item);
                Ok(())
            }
            Err(_) => Err(item),
        }
    }

    /// Removes and returns the head, or `None` if empty.
    pub fn pop(&self) -> Option<BufferItem> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Removes every remaining item, invoking `dispose` on each, in FIFO
    /// order. Used by `stop_server`.
    pub fn drain(&self, mut dispose: impl FnMut(BufferItem)) {
        let mut queue = self.inner.lock().unwrap();
        while let Some(item) = queue.pop_front() {
            dispose(item);
        }
    }
}
