//! End-to-end lifecycle tests: arming, establishment, pumping, failure,
//! and teardown, over in-memory sockets and over real TCP on loopback.

mod common;

use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use p2p_walkie::audio::AudioFrame;
use p2p_walkie::config::{AudioConfig, TransportConfig};
use p2p_walkie::error::{AudioError, ConnectError};
use p2p_walkie::session::{DisconnectReason, ErrorEvent, SessionEvent, SessionManager, SessionState};
use p2p_walkie::transport::{SessionSocket, TcpTransport};

use common::{peer, socket_pair, ConnectOutcome, MockEngine, MockTransport};

fn next_event(rx: &Receiver<SessionEvent>, what: &str) -> SessionEvent {
    rx.recv_timeout(Duration::from_secs(5))
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

fn assert_no_event(rx: &Receiver<SessionEvent>) {
    if let Ok(event) = rx.recv_timeout(Duration::from_millis(200)) {
        panic!("unexpected event: {event}");
    }
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        if Instant::now() > deadline {
            panic!("timed out waiting until {what}");
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_starts_idle() {
    let transport = Arc::new(MockTransport::new(vec![]));
    let manager = SessionManager::new(transport, Arc::new(MockEngine::new()), AudioConfig::default());
    assert_eq!(manager.state(), SessionState::Idle);
}

#[test]
fn test_connect_failure_returns_to_idle() {
    let transport = Arc::new(MockTransport::new(vec![ConnectOutcome::Fail(
        ConnectError::ConnectFailed("connection refused".to_string()),
    )]));
    let manager = SessionManager::new(transport, Arc::new(MockEngine::new()), AudioConfig::default());
    let events = manager.events();

    manager.connect(peer("Remote", 1)).unwrap();

    assert!(matches!(
        next_event(&events, "connecting"),
        SessionEvent::Connecting { .. }
    ));
    match next_event(&events, "connect error") {
        SessionEvent::Error(ErrorEvent::Connect(ConnectError::ConnectFailed(_))) => {}
        other => panic!("expected connect failure, got {other}"),
    }
    wait_until("state is idle", || manager.state() == SessionState::Idle);
    assert_no_event(&events);
}

#[test]
fn test_established_session_pumps_frames() {
    let remote = peer("Remote", 1);
    let (a, mut b) = socket_pair(Some(remote.clone()), None);
    let transport = Arc::new(MockTransport::new(vec![ConnectOutcome::Ready(Box::new(a))]));
    let audio = AudioConfig::default();
    let manager = SessionManager::new(transport, Arc::new(MockEngine::new()), audio.clone());
    let events = manager.events();

    manager.connect(remote.clone()).unwrap();
    assert!(matches!(
        next_event(&events, "connecting"),
        SessionEvent::Connecting { .. }
    ));
    match next_event(&events, "connected") {
        SessionEvent::Connected { peer: Some(p) } => assert_eq!(p, remote),
        other => panic!("expected connected, got {other}"),
    }

    // Each submitted frame becomes exactly one socket write of frame size.
    let sink = manager.frame_sink();
    let frame_len = audio.buffer_size();
    for _ in 0..5 {
        assert!(sink.submit(AudioFrame::silence(frame_len)));
    }

    let mut buf = vec![0u8; frame_len * 2];
    for i in 0..5 {
        let n = b.read(&mut buf).unwrap();
        assert_eq!(n, frame_len, "write {i} has wrong size");
    }

    manager.teardown();
    assert_eq!(
        next_event(&events, "disconnected"),
        SessionEvent::Disconnected {
            reason: DisconnectReason::Requested
        }
    );

    // Frames after teardown are dropped, never queued.
    assert!(!sink.submit(AudioFrame::silence(frame_len)));
    assert_eq!(b.pending_chunks(), 0);
    assert_eq!(b.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_received_bytes_reach_playback() {
    let (a, mut b) = socket_pair(Some(peer("Remote", 1)), None);
    let transport = Arc::new(MockTransport::new(vec![ConnectOutcome::Ready(Box::new(a))]));
    let engine = Arc::new(MockEngine::new());
    let played = engine.played.clone();
    let manager = SessionManager::new(transport, engine, AudioConfig::default());
    let events = manager.events();

    manager.connect(peer("Remote", 1)).unwrap();
    next_event(&events, "connecting");
    next_event(&events, "connected");

    // Arbitrary byte counts pass straight through to playback.
    b.write_all(&[1, 2, 3, 4, 5, 6]).unwrap();
    wait_until("bytes played", || !played.lock().is_empty());
    assert_eq!(played.lock().concat(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_remote_close_emits_single_disconnect() {
    let (a, b) = socket_pair(Some(peer("Remote", 1)), None);
    let transport = Arc::new(MockTransport::new(vec![ConnectOutcome::Ready(Box::new(a))]));
    let engine = Arc::new(MockEngine::new());
    let releases = engine.playback_releases.clone();
    let manager = SessionManager::new(transport, engine, AudioConfig::default());
    let events = manager.events();

    manager.connect(peer("Remote", 1)).unwrap();
    next_event(&events, "connecting");
    next_event(&events, "connected");

    b.shutdown().unwrap();

    match next_event(&events, "disconnected") {
        SessionEvent::Disconnected {
            reason: DisconnectReason::SessionIo(_),
        } => {}
        other => panic!("expected I/O disconnect, got {other}"),
    }
    wait_until("playback released", || {
        releases.load(std::sync::atomic::Ordering::SeqCst) == 1
    });

    // The session is gone; frames are dropped again.
    assert!(!manager.frame_sink().submit(AudioFrame::silence(8)));

    // A teardown after the session already died stays silent.
    manager.teardown();
    assert_no_event(&events);
    assert_eq!(manager.state(), SessionState::Idle);
}

#[test]
fn test_new_connect_supersedes_pending_attempt() {
    let remote = peer("Second", 2);
    let (a, _b) = socket_pair(Some(remote.clone()), None);
    let transport = Arc::new(MockTransport::new(vec![
        ConnectOutcome::WaitForCancel,
        ConnectOutcome::Ready(Box::new(a)),
    ]));
    let manager = SessionManager::new(transport, Arc::new(MockEngine::new()), AudioConfig::default());
    let events = manager.events();

    manager.connect(peer("First", 1)).unwrap();
    assert!(matches!(
        next_event(&events, "first connecting"),
        SessionEvent::Connecting { .. }
    ));
    std::thread::sleep(Duration::from_millis(50));

    // Replacing a pending attempt publishes no notification for it.
    manager.connect(remote.clone()).unwrap();
    match next_event(&events, "second connecting") {
        SessionEvent::Connecting { peer: p } => assert_eq!(p, remote),
        other => panic!("expected connecting, got {other}"),
    }
    match next_event(&events, "connected") {
        SessionEvent::Connected { peer: Some(p) } => assert_eq!(p, remote),
        other => panic!("expected connected, got {other}"),
    }
    assert_no_event(&events);
}

#[test]
fn test_listen_cancelled_by_teardown() {
    let transport = Arc::new(MockTransport::new(vec![ConnectOutcome::WaitForCancel]));
    let manager = SessionManager::new(transport, Arc::new(MockEngine::new()), AudioConfig::default());
    let events = manager.events();

    manager.listen().unwrap();
    assert_eq!(next_event(&events, "listening"), SessionEvent::Listening);

    manager.teardown();
    assert_eq!(
        next_event(&events, "disconnected"),
        SessionEvent::Disconnected {
            reason: DisconnectReason::Requested
        }
    );
    assert_eq!(manager.state(), SessionState::Idle);
    assert_no_event(&events);
}

#[test]
fn test_teardown_is_idempotent() {
    let (a, _b) = socket_pair(Some(peer("Remote", 1)), None);
    let transport = Arc::new(MockTransport::new(vec![ConnectOutcome::Ready(Box::new(a))]));
    let manager = SessionManager::new(transport, Arc::new(MockEngine::new()), AudioConfig::default());
    let events = manager.events();

    manager.connect(peer("Remote", 1)).unwrap();
    next_event(&events, "connecting");
    next_event(&events, "connected");

    manager.teardown();
    assert_eq!(
        next_event(&events, "disconnected"),
        SessionEvent::Disconnected {
            reason: DisconnectReason::Requested
        }
    );
    manager.teardown();
    assert_no_event(&events);
    assert_eq!(manager.state(), SessionState::Idle);
}

#[test]
fn test_playback_open_failure_fails_attempt() {
    let (a, mut b) = socket_pair(Some(peer("Remote", 1)), None);
    let transport = Arc::new(MockTransport::new(vec![ConnectOutcome::Ready(Box::new(a))]));
    let manager = SessionManager::new(
        transport,
        Arc::new(MockEngine::failing_playback()),
        AudioConfig::default(),
    );
    let events = manager.events();

    manager.connect(peer("Remote", 1)).unwrap();
    next_event(&events, "connecting");
    match next_event(&events, "audio error") {
        SessionEvent::Error(ErrorEvent::Audio(AudioError::DeviceUnavailable(_))) => {}
        other => panic!("expected device error, got {other}"),
    }
    wait_until("state is idle", || manager.state() == SessionState::Idle);

    // The socket is released, so the remote observes a close.
    let mut buf = [0u8; 8];
    assert_eq!(b.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_tcp_listener_and_connector_establish() {
    let mut config_a = TransportConfig::default();
    config_a.port = 0;
    let transport_a = Arc::new(TcpTransport::new(config_a, "Alpha"));
    let engine_a = Arc::new(MockEngine::new());
    let played_a = engine_a.played.clone();
    let manager_a = SessionManager::new(transport_a.clone(), engine_a, AudioConfig::default());
    let events_a = manager_a.events();

    let config_b = TransportConfig::default();
    let transport_b = Arc::new(TcpTransport::new(config_b, "Beta"));
    let manager_b = SessionManager::new(
        transport_b,
        Arc::new(MockEngine::new()),
        AudioConfig::default(),
    );
    let events_b = manager_b.events();

    manager_a.listen().unwrap();
    assert_eq!(next_event(&events_a, "listening"), SessionEvent::Listening);

    // The listener bound an ephemeral port; wait for it to report where.
    let mut bound = None;
    wait_until("listener bound", || {
        bound = transport_a.local_addr();
        bound.is_some()
    });
    let addr = bound.unwrap();

    manager_b.connect(peer("Alpha", addr.port())).unwrap();
    next_event(&events_b, "connecting");

    match next_event(&events_a, "listener connected") {
        SessionEvent::Connected { peer: Some(p) } => assert_eq!(p.name, "Beta"),
        other => panic!("expected connected, got {other}"),
    }
    match next_event(&events_b, "connector connected") {
        SessionEvent::Connected { peer: Some(p) } => assert_eq!(p.name, "Alpha"),
        other => panic!("expected connected, got {other}"),
    }

    // One frame from the connector arrives in the listener's playback.
    let frame_len = AudioConfig::default().buffer_size();
    assert!(manager_b
        .frame_sink()
        .submit(AudioFrame::silence(frame_len)));
    wait_until("frame played", || {
        played_a.lock().iter().map(Vec::len).sum::<usize>() == frame_len
    });

    manager_b.teardown();
    assert_eq!(
        next_event(&events_b, "disconnected"),
        SessionEvent::Disconnected {
            reason: DisconnectReason::Requested
        }
    );
    match next_event(&events_a, "remote close") {
        SessionEvent::Disconnected {
            reason: DisconnectReason::SessionIo(_),
        } => {}
        other => panic!("expected I/O disconnect, got {other}"),
    }
    manager_a.teardown();
}
