//! In-memory transport and audio doubles for lifecycle tests.

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use p2p_walkie::audio::{AudioEngine, AudioFrame, CaptureSource, PlaybackSink};
use p2p_walkie::error::{AudioError, ConnectError};
use p2p_walkie::transport::{CancelToken, PeerHandle, SessionSocket, Transport};

/// One direction of an in-memory duplex stream. Chunk boundaries are
/// preserved so tests can count individual writes.
#[derive(Default)]
struct PipeState {
    chunks: VecDeque<Vec<u8>>,
    closed: bool,
}

#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    cond: Condvar,
}

impl Pipe {
    fn write(&self, buf: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        state.chunks.push_back(buf.to_vec());
        self.cond.notify_all();
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        loop {
            if let Some(mut chunk) = state.chunks.pop_front() {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    chunk.drain(..n);
                    state.chunks.push_front(chunk);
                }
                return Ok(n);
            }
            if state.closed {
                return Ok(0);
            }
            self.cond.wait(&mut state);
        }
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.cond.notify_all();
    }

    fn pending_chunks(&self) -> usize {
        self.state.lock().chunks.len()
    }
}

/// One endpoint of an in-memory socket pair. `shutdown` closes both
/// directions and unblocks any reader, like a TCP shutdown does.
pub struct MemorySocket {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    peer: Option<PeerHandle>,
}

impl MemorySocket {
    /// Writes queued toward this endpoint that it has not read yet.
    pub fn pending_chunks(&self) -> usize {
        self.rx.pending_chunks()
    }
}

impl SessionSocket for MemorySocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.rx.read(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.tx.write(buf)
    }

    fn try_clone(&self) -> io::Result<Box<dyn SessionSocket>> {
        Ok(Box::new(MemorySocket {
            rx: self.rx.clone(),
            tx: self.tx.clone(),
            peer: self.peer.clone(),
        }))
    }

    fn shutdown(&self) -> io::Result<()> {
        self.rx.close();
        self.tx.close();
        Ok(())
    }

    fn peer(&self) -> Option<PeerHandle> {
        self.peer.clone()
    }
}

/// Connected pair of in-memory sockets.
pub fn socket_pair(
    a_peer: Option<PeerHandle>,
    b_peer: Option<PeerHandle>,
) -> (MemorySocket, MemorySocket) {
    let ab = Arc::new(Pipe::default());
    let ba = Arc::new(Pipe::default());
    (
        MemorySocket {
            rx: ba.clone(),
            tx: ab.clone(),
            peer: a_peer,
        },
        MemorySocket {
            rx: ab,
            tx: ba,
            peer: b_peer,
        },
    )
}

/// Scripted listen/connect outcome.
pub enum ConnectOutcome {
    /// Yield this socket immediately.
    Ready(Box<dyn SessionSocket>),
    /// Fail immediately.
    Fail(ConnectError),
    /// Block until the attempt is cancelled.
    WaitForCancel,
}

/// Transport that replays a script of outcomes, one per listen/connect
/// call. An exhausted script behaves like `WaitForCancel`.
pub struct MockTransport {
    outcomes: Mutex<VecDeque<ConnectOutcome>>,
}

impl MockTransport {
    pub fn new(outcomes: Vec<ConnectOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
        }
    }

    fn next(&self, cancel: &CancelToken) -> Result<Box<dyn SessionSocket>, ConnectError> {
        match self.outcomes.lock().pop_front() {
            Some(ConnectOutcome::Ready(socket)) => Ok(socket),
            Some(ConnectOutcome::Fail(err)) => Err(err),
            Some(ConnectOutcome::WaitForCancel) | None => {
                while !cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(2));
                }
                Err(ConnectError::Cancelled)
            }
        }
    }
}

impl Transport for MockTransport {
    fn listen(&self, cancel: &CancelToken) -> Result<Box<dyn SessionSocket>, ConnectError> {
        self.next(cancel)
    }

    fn connect(
        &self,
        _peer: &PeerHandle,
        cancel: &CancelToken,
    ) -> Result<Box<dyn SessionSocket>, ConnectError> {
        self.next(cancel)
    }
}

/// Playback double that logs every chunk and counts its own release.
struct RecordingPlayback {
    log: Arc<Mutex<Vec<Vec<u8>>>>,
    releases: Arc<AtomicUsize>,
}

impl PlaybackSink for RecordingPlayback {
    fn play(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        self.log.lock().push(pcm.to_vec());
        Ok(())
    }
}

impl Drop for RecordingPlayback {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Capture double producing paced silence frames.
struct SilenceCapture {
    frame_len: usize,
}

impl CaptureSource for SilenceCapture {
    fn capture_frame(&mut self) -> Result<Option<AudioFrame>, AudioError> {
        std::thread::sleep(Duration::from_millis(5));
        Ok(Some(AudioFrame::silence(self.frame_len)))
    }
}

/// Audio engine double. Records playback, produces silence on capture,
/// and can be configured to fail either open call.
pub struct MockEngine {
    pub played: Arc<Mutex<Vec<Vec<u8>>>>,
    pub playback_releases: Arc<AtomicUsize>,
    pub fail_playback: bool,
    pub capture_frame_len: usize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            played: Arc::new(Mutex::new(Vec::new())),
            playback_releases: Arc::new(AtomicUsize::new(0)),
            fail_playback: false,
            capture_frame_len: 64,
        }
    }

    pub fn failing_playback() -> Self {
        Self {
            fail_playback: true,
            ..Self::new()
        }
    }
}

impl AudioEngine for MockEngine {
    fn open_capture(&self) -> Result<Box<dyn CaptureSource>, AudioError> {
        Ok(Box::new(SilenceCapture {
            frame_len: self.capture_frame_len,
        }))
    }

    fn open_playback(&self) -> Result<Box<dyn PlaybackSink>, AudioError> {
        if self.fail_playback {
            return Err(AudioError::DeviceUnavailable("no output device".into()));
        }
        Ok(Box::new(RecordingPlayback {
            log: self.played.clone(),
            releases: self.playback_releases.clone(),
        }))
    }
}

pub fn peer(name: &str, port: u16) -> PeerHandle {
    PeerHandle {
        address: format!("127.0.0.1:{port}").parse().unwrap(),
        name: name.to_string(),
    }
}
