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

#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unused_imports
)]

//! A non-blocking TCP server that frames brace-delimited JSON messages,
//! tracks per-connection liveness via `KEEP_ALIVE` heartbeats, and delivers
//! decoded messages through a single shared FIFO queue.
//!
//! The public surface is a small set of free functions
//! ([`start_server`], [`stop_server`], [`read_message`],
//! [`get_connected_list`], [`free_bufferitem`]) operating on one
//! process-wide server instance, plus the types those functions exchange
//! ([`Config`], [`BufferItem`], [`BufferItemKind`], [`Message`]).
//!
//! Internally, an [`mio`] event dispatcher thread accepts connections and
//! distributes read readiness to a worker pool; a dedicated thread scans
//! for stale heartbeats on a fixed period. See the module list below for
//! where each piece lives.

mod acceptor;
mod config;
mod connection;
mod dispatcher;
mod error;
mod frame;
mod liveness;
mod message;
mod queue;
mod reader;
mod server;
mod table;

pub use config::Config;
pub use error::{DecodeError, StartError};
pub use message::{Message, KEEP_ALIVE_TYPE};
pub use queue::{BufferItem, BufferItemKind};
pub use server::{free_bufferitem, get_connected_list, read_message, start_server, stop_server};
