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

//! Periodic scan reporting connections whose heartbeat has gone stale.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};

use crate::dispatcher::Shared;
use crate::queue::BufferItem;

/// One pass over the connection table, reporting (but not closing) every
/// connection whose last heartbeat is older than `prod`.
///
/// Uses `try_for_each` rather than `for_each`: if the table is locked
/// elsewhere (an accept or a teardown mid-flight), this scan is skipped
/// outright instead of blocking the dedicated liveness thread. The next
/// tick tries again.
pub(crate) fn scan_once(shared: &Shared, prod: Duration) {
    let scanned = shared.table.try_for_each(|connection| {
        if connection.heartbeat_age() > prod && !connection.is_tombstoned() {
            let peer = *connection.peer().ip();
            if let Err(item) = shared.queue.try_push(BufferItem::connection_timeout(peer)) {
                tracing::debug!(%peer, "delivery queue busy, deferring timeout report");
                drop(item);
            }
        }
    });

    if !scanned {
        tracing::debug!("skipped liveness scan: connection table was busy");
    }
}

/// Handle to the running liveness thread. Dropping this without calling
/// [`LivenessScanner::stop`] leaves the thread running; `stop_server` always
/// stops it explicitly.
pub(crate) struct LivenessScanner {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl LivenessScanner {
    /// Spawns the dedicated liveness thread, ticking every `check_period`
    /// and scanning for connections whose heartbeat exceeds `prod`.
    pub(crate) fn start(shared: Arc<Shared>, check_period: Duration, prod: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("pulsewire-liveness".into())
            .spawn(move || {
                let ticks = tick(check_period);
                loop {
                    select! {
                        recv(ticks) -> _ => scan_once(&shared, prod),
                        recv(stop_rx) -> _ => return,
                    }
                }
            })
            .expect("failed to spawn liveness thread");

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signals the liveness thread to exit and waits for it to finish.
    pub(crate) fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
