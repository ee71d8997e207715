//! Session manager
//!
//! Single owner of the connection lifecycle. Nothing outside this module
//! holds the socket, the listener/connector attempt, or the worker; the
//! UI/control layer only calls `listen`/`connect`/`teardown` and consumes
//! the notification channel.
//!
//! Cancel-before-replace: every call first cancels whatever attempt or
//! worker is outstanding, so at most one of each is ever alive, even under
//! rapid repeated user actions. A generation counter stamps each attempt;
//! completions arriving with a stale stamp are dropped without a
//! notification, so a superseded attempt can never publish a stale state.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::AudioEngine;
use crate::config::AudioConfig;
use crate::error::ConnectError;
use crate::session::events::{ErrorEvent, SessionEvent};
use crate::session::sink::FrameSink;
use crate::session::state::{DisconnectReason, SessionState};
use crate::session::worker::SessionWorker;
use crate::transport::{CancelToken, DiscoveryControl, PeerHandle, SessionSocket, Transport};

/// An outstanding listener/connector role.
struct Attempt {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

/// Lifecycle state guarded by one lock, so generation bumps, state
/// transitions, and notification emission are totally ordered.
struct Core {
    generation: u64,
    state: SessionState,
    attempt: Option<Attempt>,
    worker: Option<SessionWorker>,
}

struct ManagerInner {
    transport: Arc<dyn Transport>,
    engine: Arc<dyn AudioEngine>,
    audio: AudioConfig,
    sink: Arc<FrameSink>,
    events_tx: Sender<SessionEvent>,
    core: Mutex<Core>,
    discovery: Mutex<Option<Box<dyn DiscoveryControl>>>,
}

/// Orchestrates the listener, connector, and session worker so that at
/// most one session is ever active.
pub struct SessionManager {
    inner: Arc<ManagerInner>,
    events_rx: Receiver<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        engine: Arc<dyn AudioEngine>,
        audio: AudioConfig,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            inner: Arc::new(ManagerInner {
                transport,
                engine,
                audio,
                sink: Arc::new(FrameSink::new()),
                events_tx,
                core: Mutex::new(Core {
                    generation: 0,
                    state: SessionState::Idle,
                    attempt: None,
                    worker: None,
                }),
                discovery: Mutex::new(None),
            }),
            events_rx,
        }
    }

    /// Notification channel for the control layer.
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    /// Submission point the transmission gate feeds captured frames into.
    pub fn frame_sink(&self) -> Arc<FrameSink> {
        self.inner.sink.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.core.lock().state.clone()
    }

    /// Install the discovery collaborator hook, cancelled before dialing.
    pub fn set_discovery(&self, discovery: Box<dyn DiscoveryControl>) {
        *self.inner.discovery.lock() = Some(discovery);
    }

    /// Arm the listener role: wait passively for one inbound connection.
    /// Cancels any outstanding attempt or session first.
    pub fn listen(&self) -> crate::Result<()> {
        self.begin_attempt(None)
    }

    /// Arm the connector role: dial the chosen peer. Cancels any
    /// outstanding attempt or session (and ongoing discovery) first.
    pub fn connect(&self, peer: PeerHandle) -> crate::Result<()> {
        if let Some(discovery) = &*self.inner.discovery.lock() {
            discovery.cancel_discovery();
        }
        self.begin_attempt(Some(peer))
    }

    /// Tear down whatever is outstanding and return to `Idle`. Safe to
    /// call twice; the second call observes nothing to do and stays
    /// silent.
    pub fn teardown(&self) {
        let (old_attempt, old_worker) = {
            let mut core = self.inner.core.lock();
            core.generation += 1;
            let old = self.inner.cancel_current(&mut core);
            // An explicit teardown of anything outstanding reports once;
            // from Idle or an already-dead session it stays silent.
            if matches!(
                core.state,
                SessionState::Listening
                    | SessionState::Connecting { .. }
                    | SessionState::Connected { .. }
            ) {
                self.inner.emit(SessionEvent::Disconnected {
                    reason: DisconnectReason::Requested,
                });
            }
            core.state = SessionState::Idle;
            old
        };
        join_superseded(old_attempt, old_worker);
    }

    fn begin_attempt(&self, target: Option<PeerHandle>) -> crate::Result<()> {
        let inner = self.inner.clone();
        let cancel = CancelToken::new();

        let mut core = self.inner.core.lock();
        core.generation += 1;
        let generation = core.generation;
        let (old_attempt, old_worker) = self.inner.cancel_current(&mut core);

        // Replacing a live session reports its end; a superseded attempt
        // vanishes silently, the new Connecting/Listening event covers it.
        if core.state.is_connected() {
            self.inner.emit(SessionEvent::Disconnected {
                reason: DisconnectReason::Requested,
            });
        }

        match &target {
            None => {
                core.state = SessionState::Listening;
                self.inner.emit(SessionEvent::Listening);
            }
            Some(peer) => {
                core.state = SessionState::Connecting { peer: peer.clone() };
                self.inner.emit(SessionEvent::Connecting { peer: peer.clone() });
            }
        }

        let thread_cancel = cancel.clone();
        let name = if target.is_some() {
            "session-connect"
        } else {
            "session-listen"
        };
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let result = match &target {
                    None => inner.transport.listen(&thread_cancel),
                    Some(peer) => inner.transport.connect(peer, &thread_cancel),
                };
                match result {
                    Ok(socket) => inner.attempt_established(generation, socket),
                    Err(e) => inner.attempt_failed(generation, e),
                }
            })?;

        core.attempt = Some(Attempt { cancel, handle });
        drop(core);

        join_superseded(old_attempt, old_worker);
        Ok(())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Join a replaced attempt/worker off-lock. Their completion handlers
/// carry a stale generation and are swallowed.
fn join_superseded(attempt: Option<Attempt>, worker: Option<SessionWorker>) {
    if let Some(attempt) = attempt {
        let _ = attempt.handle.join();
    }
    if let Some(mut worker) = worker {
        worker.join();
    }
}

impl ManagerInner {
    fn emit(&self, event: SessionEvent) {
        tracing::debug!("session event: {}", event);
        let _ = self.events_tx.send(event);
    }

    /// Cancel whatever is outstanding. Must run with the core locked and
    /// after the generation bump; returns the handles for off-lock joins.
    /// Emitting the matching notification is the caller's business.
    fn cancel_current(&self, core: &mut Core) -> (Option<Attempt>, Option<SessionWorker>) {
        let attempt = core.attempt.take();
        if let Some(attempt) = &attempt {
            attempt.cancel.cancel();
        }
        let worker = core.worker.take();
        if let Some(worker) = &worker {
            worker.request_stop();
        }
        self.sink.clear();
        (attempt, worker)
    }

    /// A listener/connector yielded a socket.
    fn attempt_established(self: &Arc<Self>, generation: u64, socket: Box<dyn SessionSocket>) {
        if self.is_stale(generation) {
            let _ = socket.shutdown();
            return;
        }

        // Open playback lazily, per session, before the worker exists.
        let playback = match self.engine.open_playback() {
            Ok(playback) => playback,
            Err(e) => {
                let _ = socket.shutdown();
                self.settle_failed_attempt(generation, ErrorEvent::Audio(e));
                return;
            }
        };

        let peer = socket.peer();
        let callback_inner = self.clone();
        let worker = SessionWorker::spawn(
            socket,
            playback,
            self.audio.buffer_size(),
            Box::new(move |reason| callback_inner.worker_ended(generation, reason)),
        );
        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                self.settle_failed_attempt(
                    generation,
                    ErrorEvent::Connect(ConnectError::ConnectFailed(e.to_string())),
                );
                return;
            }
        };

        let mut core = self.core.lock();
        if core.generation != generation {
            // Superseded while we were setting up; discard quietly.
            drop(core);
            drop(worker);
            return;
        }
        core.attempt = None;
        self.sink.install(worker.sender());
        core.worker = Some(worker);
        core.state = SessionState::Connected { peer: peer.clone() };
        self.emit(SessionEvent::Connected { peer });
    }

    /// A listener/connector failed. Cancellation is not a failure; the
    /// superseding call already published the newer state.
    fn attempt_failed(&self, generation: u64, err: ConnectError) {
        if err == ConnectError::Cancelled {
            return;
        }
        self.settle_failed_attempt(generation, ErrorEvent::Connect(err));
    }

    fn settle_failed_attempt(&self, generation: u64, err: ErrorEvent) {
        let mut core = self.core.lock();
        if core.generation != generation {
            return;
        }
        core.attempt = None;
        core.state = SessionState::Idle;
        self.emit(SessionEvent::Error(err));
    }

    /// The worker ended on its own (I/O or device failure). Runs on a
    /// duty thread, so the worker handle is left in place and joined by
    /// the next transition.
    fn worker_ended(&self, generation: u64, reason: DisconnectReason) {
        let mut core = self.core.lock();
        if core.generation != generation {
            return;
        }
        self.sink.clear();
        core.state = SessionState::Disconnected {
            reason: reason.clone(),
        };
        self.emit(SessionEvent::Disconnected { reason });
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.core.lock().generation != generation
    }
}
