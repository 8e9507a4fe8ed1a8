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

//! Public lifecycle API: a single process-wide server instance.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::{Arc, Mutex, OnceLock};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::StartError;
use crate::liveness::LivenessScanner;
use crate::queue::{BufferItem, DeliveryQueue};

/// Everything kept alive for the duration of one running server.
struct ServerHandle {
    dispatcher: Dispatcher,
    liveness: LivenessScanner,
    queue: Arc<DeliveryQueue>,
}

/// The single running server instance, if any. Mirrors the module-level
/// statics of the connection engine this crate's lifecycle is modeled on:
/// the public API below is a set of free functions operating on whichever
/// server is currently running, not methods on a handle the caller holds.
static SERVER: OnceLock<Mutex<Option<ServerHandle>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<ServerHandle>> {
    SERVER.get_or_init(|| Mutex::new(None))
}

/// Starts listening on `addr` with `config`, spawning the event dispatcher,
/// its worker pool, and the liveness scanner.
///
/// Returns [`StartError::AlreadyRunning`] if a server is already running;
/// callers must [`stop_server`] first. Any other error means every resource
/// `start_server` allocated (socket, registrations, threads) has already
/// been released before the error is returned — there is nothing to clean
/// up on failure.
pub fn start_server(addr: SocketAddrV4, config: Config) -> Result<(), StartError> {
    let mut guard = slot().lock().unwrap();
    if guard.is_some() {
        return Err(StartError::AlreadyRunning);
    }

    let queue = Arc::new(DeliveryQueue::new());
    let dispatcher = Dispatcher::start(addr, config, Arc::clone(&queue))?;
    let liveness = LivenessScanner::start(
        Arc::clone(dispatcher.shared()),
        config.check_period(),
        config.keep_alive_prod,
    );

    tracing::debug!(%addr, "server started");
    *guard = Some(ServerHandle {
        dispatcher,
        liveness,
        queue,
    });
    Ok(())
}

/// Stops the running server, if any: signals and joins the dispatcher
/// thread, the worker pool, and the liveness thread, then drains whatever
/// was left in the delivery queue. A no-op if no server is running.
pub fn stop_server() {
    let handle = slot().lock().unwrap().take();
    let Some(handle) = handle else {
        return;
    };

    handle.dispatcher.stop();
    handle.liveness.stop();
    handle.queue.drain(|item| {
        tracing::debug!(peer = %item.peer, "discarding undelivered item at shutdown");
    });
    tracing::debug!("server stopped");
}

/// Pops the oldest undelivered [`BufferItem`], or `None` if the queue is
/// empty or no server is running.
pub fn read_message() -> Option<BufferItem> {
    let guard = slot().lock().unwrap();
    guard.as_ref().and_then(|handle| handle.queue.pop())
}

/// Releases a [`BufferItem`] obtained from [`read_message`].
///
/// Ownership already makes this unnecessary in Rust — dropping the value
/// suffices — but the function is kept for callers translating an API built
/// around an explicit free call.
pub fn free_bufferitem(item: BufferItem) {
    drop(item);
}

/// Snapshot of every currently connected peer's address. Empty if no server
/// is running.
pub fn get_connected_list() -> Vec<Ipv4Addr> {
    let guard = slot().lock().unwrap();
    guard
        .as_ref()
        .map(|handle| handle.dispatcher.shared().table.snapshot_peers())
        .unwrap_or_default()
}
