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

//! The event dispatcher: a single `mio::Poll` loop feeding a worker pool.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Registry, Token, Waker};

use crate::acceptor;
use crate::config::Config;
use crate::error::StartError;
use crate::queue::DeliveryQueue;
use crate::reader;
use crate::table::ConnectionTable;

/// `Token` reserved for the listening socket's readiness events.
const LISTEN_TOKEN: Token = Token(usize::MAX);
/// `Token` reserved for the shutdown waker.
const WAKE_TOKEN: Token = Token(usize::MAX - 1);

/// Context shared by the dispatcher thread, every worker thread, and the
/// Liveness scanner. Cheap to share via `Arc` since every field is already
/// internally synchronized or itself cheaply cloneable.
pub(crate) struct Shared {
    pub(crate) table: ConnectionTable,
    pub(crate) queue: Arc<DeliveryQueue>,
    pub(crate) registry: Registry,
    pub(crate) config: Config,
}

/// Everything `start_server` needs to keep alive for the lifetime of a
/// running server, and to tear down cleanly on `stop_server`.
pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
    waker: Arc<Waker>,
    stopping: Arc<AtomicBool>,
    dispatcher_thread: Option<JoinHandle<()>>,
    worker_threads: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Binds the listening socket, arms the event dispatcher, and spawns the
    /// dispatcher thread plus the worker pool. Everything allocated here is
    /// torn down if any later step fails, so a `start_server` caller never
    /// leaks a bound socket or a spawned thread on error.
    pub(crate) fn start(
        addr: std::net::SocketAddrV4,
        config: Config,
        queue: Arc<DeliveryQueue>,
    ) -> Result<Self, StartError> {
        let mut listener =
            TcpListener::bind(addr.into()).map_err(|source| StartError::Bind { addr, source })?;

        let poll = Poll::new().map_err(StartError::Socket)?;
        poll.registry()
            .register(&mut listener, LISTEN_TOKEN, Interest::READABLE)
            .map_err(StartError::Register)?;

        let waker = Arc::new(Waker::new(poll.registry(), WAKE_TOKEN).map_err(StartError::Waker)?);

        let registry = poll
            .registry()
            .try_clone()
            .map_err(StartError::CloneRegistry)?;

        let shared = Arc::new(Shared {
            table: ConnectionTable::new(),
            queue,
            registry,
            config,
        });

        let (work_tx, work_rx) = bounded::<Token>(config.events_capacity);
        let stopping = Arc::new(AtomicBool::new(false));

        let worker_threads = (0..config.worker_threads.max(1))
            .map(|index| spawn_worker(index, Arc::clone(&shared), work_rx.clone()))
            .collect();

        let dispatcher_thread = spawn_dispatcher(
            Arc::clone(&shared),
            poll,
            listener,
            work_tx,
            Arc::clone(&stopping),
        );

        Ok(Self {
            shared,
            waker,
            stopping,
            dispatcher_thread: Some(dispatcher_thread),
            worker_threads,
        })
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Signals the dispatcher loop to exit, waits for every thread it owns
    /// (dispatcher plus worker pool) to finish, then destroys every
    /// connection still in the table: each is tombstoned, deregistered from
    /// the event dispatcher, and dropped, all under the table's lock.
    ///
    /// The wake failure is logged, not propagated, since by this point the
    /// caller has already committed to stopping.
    pub(crate) fn stop(mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Err(error) = self.waker.wake() {
            tracing::warn!(%error, "failed to wake dispatcher thread during shutdown");
        }

        if let Some(handle) = self.dispatcher_thread.take() {
            let _ = handle.join();
        }
        for handle in self.worker_threads.drain(..) {
            let _ = handle.join();
        }

        for connection in self.shared.table.drain() {
            connection.tombstone();
            connection.with_stream(|stream| {
                if let Err(error) = self.shared.registry.deregister(stream) {
                    tracing::debug!(peer = %connection.peer(), %error, "deregister failed while destroying connection at shutdown");
                }
            });
            tracing::debug!(peer = %connection.peer(), handle = connection.handle().0, "connection destroyed at shutdown");
        }
    }
}

fn spawn_dispatcher(
    shared: Arc<Shared>,
    mut poll: Poll,
    mut listener: TcpListener,
    work_tx: Sender<Token>,
    stopping: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("pulsewire-dispatcher".into())
        .spawn(move || {
            let mut events = Events::with_capacity(shared.config.events_capacity);
            loop {
                match poll.poll(&mut events, None) {
                    Ok(()) => {}
                    Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                    Err(error) => {
                        tracing::error!(%error, "dispatcher poll failed, stopping");
                        return;
                    }
                }

                for event in events.iter() {
                    match event.token() {
                        LISTEN_TOKEN => acceptor::accept_all(&mut listener, &shared),
                        WAKE_TOKEN => {
                            if stopping.load(Ordering::SeqCst) {
                                return;
                            }
                        }
                        token => {
                            // mio's readiness notifications are edge-triggered:
                            // a dropped notification for a socket whose receive
                            // buffer still holds unread bytes would never
                            // refire, stalling that connection forever. So this
                            // blocks rather than drops when the worker pool is
                            // saturated — backpressure onto the dispatcher
                            // thread (and, transitively, onto `accept`) instead
                            // of losing a readiness event.
                            if work_tx.send(token).is_err() {
                                tracing::error!("worker pool gone, dispatcher stopping");
                                return;
                            }
                        }
                    }
                }
            }
        })
        .expect("failed to spawn dispatcher thread")
}

fn spawn_worker(index: usize, shared: Arc<Shared>, work_rx: Receiver<Token>) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("pulsewire-worker-{index}"))
        .spawn(move || {
            while let Ok(token) = work_rx.recv() {
                reader::on_readable(&shared, token);
            }
        })
        .expect("failed to spawn worker thread")
}
