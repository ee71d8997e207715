//! Session worker: the bidirectional pump
//!
//! Owns the one live session socket exclusively and runs two duties on
//! separate threads for the life of the session:
//!
//! - **receive**: read up to one frame's worth of bytes and forward every
//!   non-empty read straight to playback. The byte count per read is
//!   whatever the socket returns; read boundaries do not correspond to the
//!   remote's write boundaries (stream semantics).
//! - **send**: take frames submitted through the gate's channel and write
//!   them to the socket.
//!
//! A failure in either duty ends the whole session: the socket is closed
//! exactly once, the other duty unblocks on the dead socket, playback is
//! released, and the disconnect callback fires at most once. An external
//! stop (teardown / cancel-before-replace) closes the socket the same way
//! but suppresses the callback; the manager already knows.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::{AudioFrame, PlaybackSink};
use crate::constants::FRAME_CHANNEL_CAPACITY;
use crate::session::state::DisconnectReason;
use crate::transport::SessionSocket;

/// Callback invoked (at most once) when the session ends on its own.
pub type DisconnectFn = Box<dyn FnOnce(DisconnectReason) + Send>;

struct WorkerShared {
    /// External stop requested; suppresses the disconnect callback.
    stop: AtomicBool,
    /// Socket shutdown already performed.
    closed: AtomicBool,
    /// Control handle used only for shutdown.
    ctl: Mutex<Box<dyn SessionSocket>>,
    notify: Mutex<Option<DisconnectFn>>,
}

impl WorkerShared {
    /// Close the socket exactly once. Unblocks any read parked on it.
    fn close_socket(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.ctl.lock().shutdown() {
                tracing::debug!("socket shutdown failed: {}", e);
            }
        }
    }

    /// End the session from inside a duty thread.
    fn finish(&self, reason: DisconnectReason) {
        self.close_socket();
        if self.stop.load(Ordering::SeqCst) {
            return;
        }
        // Take the callback out before invoking it so no lock is held
        // while it runs (it re-enters the session manager).
        let notify = self.notify.lock().take();
        if let Some(notify) = notify {
            tracing::info!("session ended: {}", reason);
            notify(reason);
        }
    }
}

/// The active session's pump. Created by the session manager once a
/// listener or connector yields a socket; destroyed on socket failure,
/// explicit teardown, or shutdown.
pub struct SessionWorker {
    shared: Arc<WorkerShared>,
    frame_tx: Sender<AudioFrame>,
    recv_thread: Option<JoinHandle<()>>,
    send_thread: Option<JoinHandle<()>>,
}

impl SessionWorker {
    /// Split the socket into its duties and start pumping.
    pub fn spawn(
        socket: Box<dyn SessionSocket>,
        playback: Box<dyn PlaybackSink>,
        buffer_size: usize,
        on_disconnect: DisconnectFn,
    ) -> io::Result<Self> {
        let read_half = socket.try_clone()?;
        let write_half = socket.try_clone()?;

        let shared = Arc::new(WorkerShared {
            stop: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            ctl: Mutex::new(socket),
            notify: Mutex::new(Some(on_disconnect)),
        });

        let (frame_tx, frame_rx) = bounded::<AudioFrame>(FRAME_CHANNEL_CAPACITY);

        let recv_shared = shared.clone();
        let recv_thread = thread::Builder::new()
            .name("session-recv".to_string())
            .spawn(move || {
                receive_duty(read_half, playback, buffer_size, recv_shared);
            })?;

        let send_shared = shared.clone();
        let send_thread = match thread::Builder::new()
            .name("session-send".to_string())
            .spawn(move || {
                send_duty(write_half, frame_rx, send_shared);
            }) {
            Ok(handle) => handle,
            Err(e) => {
                shared.stop.store(true, Ordering::SeqCst);
                shared.close_socket();
                let _ = recv_thread.join();
                return Err(e);
            }
        };

        Ok(Self {
            shared,
            frame_tx,
            recv_thread: Some(recv_thread),
            send_thread: Some(send_thread),
        })
    }

    /// Channel the transmission gate feeds outbound frames into.
    pub fn sender(&self) -> Sender<AudioFrame> {
        self.frame_tx.clone()
    }

    /// Stop without notifying, used for teardown and replacement.
    /// Idempotent; never blocks.
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.notify.lock().take();
        self.shared.close_socket();
    }

    /// Join both duty threads. Must not be called from a duty thread.
    pub fn join(&mut self) {
        if let Some(handle) = self.recv_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.send_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        self.request_stop();
        self.join();
    }
}

/// Receive duty: socket reads go straight to playback; terminal on error
/// or end-of-stream. Playback is released when the duty ends, whatever
/// the cause.
fn receive_duty(
    mut socket: Box<dyn SessionSocket>,
    mut playback: Box<dyn PlaybackSink>,
    buffer_size: usize,
    shared: Arc<WorkerShared>,
) {
    let mut buf = vec![0u8; buffer_size];
    let reason = loop {
        if shared.stop.load(Ordering::Relaxed) {
            break None;
        }
        match socket.read(&mut buf) {
            Ok(0) => {
                break Some(DisconnectReason::SessionIo(
                    "connection closed by peer".to_string(),
                ));
            }
            Ok(n) => {
                if let Err(e) = playback.play(&buf[..n]) {
                    break Some(DisconnectReason::Device(e.to_string()));
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => break Some(DisconnectReason::SessionIo(e.to_string())),
        }
    };

    drop(playback);

    match reason {
        Some(reason) => shared.finish(reason),
        None => shared.close_socket(),
    }
}

/// Send duty: frames submitted by the gate are written to the socket in
/// order; terminal on write failure. Wakes periodically to observe stop
/// requests even when nobody is talking.
fn send_duty(
    mut socket: Box<dyn SessionSocket>,
    frame_rx: Receiver<AudioFrame>,
    shared: Arc<WorkerShared>,
) {
    loop {
        match frame_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => {
                if let Err(e) = socket.write_all(frame.as_ref()) {
                    shared.finish(DisconnectReason::SessionIo(e.to_string()));
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if shared.stop.load(Ordering::Relaxed) || shared.closed.load(Ordering::Relaxed) {
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
