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

//! Error types for the fallible boundaries of the crate.
//!
//! Per-connection failures (decode errors, protocol framing errors, peer
//! closure) are *not* represented here — they flow to consumers as
//! [`crate::queue::BufferItem`]s, per the error handling policy of the
//! connection lifecycle. These types cover only [`crate::start_server`] and
//! message decoding.

use std::io;
use std::net::SocketAddrV4;

/// Failure starting the server. Any variant here means `start_server` has
/// already unwound whatever it allocated before returning.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// A server is already running; call `stop_server` first.
    #[error("server is already running")]
    AlreadyRunning,
    /// Could not create the non-blocking listening socket.
    #[error("failed to create listening socket: {0}")]
    Socket(#[source] io::Error),
    /// Could not bind the listening socket to the requested address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// Address the server attempted to bind.
        addr: SocketAddrV4,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Could not register the listening socket with the event dispatcher.
    #[error("failed to register listener with the event dispatcher: {0}")]
    Register(#[source] io::Error),
    /// Could not create the dispatcher's shutdown waker.
    #[error("failed to create shutdown waker: {0}")]
    Waker(#[source] io::Error),
    /// Could not clone a registry handle for the worker/liveness threads.
    #[error("failed to clone event dispatcher registry: {0}")]
    CloneRegistry(#[source] io::Error),
}

/// Failure decoding a frame's bytes into a [`crate::message::Message`].
#[derive(Debug, thiserror::Error)]
#[error("could not decode message: {0}")]
pub struct DecodeError(#[from] pub(crate) serde_json::Error);
