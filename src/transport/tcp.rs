//! TCP session transport
//!
//! Listener role: bind the rendezvous socket, accept exactly one inbound
//! connection, close the rendezvous point, exchange service banners.
//! Connector role: dial the peer's rendezvous point with a timeout and
//! exchange banners. The accept loop polls a non-blocking listener so a
//! cancellation from another thread unblocks it instead of hanging.

use parking_lot::Mutex;
use socket2::{Domain, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::config::TransportConfig;
use crate::constants::{ACCEPT_POLL_INTERVAL_MS, BANNER_POLL_INTERVAL_MS};
use crate::error::ConnectError;
use crate::transport::{
    handshake, CancelToken, PeerHandle, ServiceBanner, SessionSocket, Transport,
};

/// A connected TCP stream plus the identity learned from the banner.
pub struct TcpSessionSocket {
    stream: TcpStream,
    peer: Option<PeerHandle>,
}

impl TcpSessionSocket {
    fn new(stream: TcpStream) -> Self {
        Self { stream, peer: None }
    }

    fn set_peer(&mut self, peer: PeerHandle) {
        self.peer = Some(peer);
    }
}

impl SessionSocket for TcpSessionSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)
    }

    fn try_clone(&self) -> io::Result<Box<dyn SessionSocket>> {
        Ok(Box::new(Self {
            stream: self.stream.try_clone()?,
            peer: self.peer.clone(),
        }))
    }

    fn shutdown(&self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            // Second shutdown observes "already closed" and no-ops.
            Err(ref e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn peer(&self) -> Option<PeerHandle> {
        self.peer.clone()
    }
}

/// TCP implementation of the duplex byte-stream provider.
pub struct TcpTransport {
    config: TransportConfig,
    banner: ServiceBanner,
    bound: Mutex<Option<SocketAddr>>,
}

impl TcpTransport {
    pub fn new(config: TransportConfig, display_name: &str) -> Self {
        Self {
            config,
            banner: ServiceBanner::local(display_name),
            bound: Mutex::new(None),
        }
    }

    /// Address of the most recently bound rendezvous point. `None` until
    /// the first `listen` call has bound its socket; useful when the
    /// configured port is 0 and the OS picks one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock()
    }

    /// Bind and configure the rendezvous socket.
    fn bind_listener(&self) -> Result<TcpListener, ConnectError> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConnectError::TransportUnavailable(e.to_string())
            })?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)
            .map_err(map_io_error)?;
        if self.config.reuse_addr {
            socket.set_reuse_address(true).map_err(map_io_error)?;
        }
        socket.bind(&addr.into()).map_err(map_io_error)?;
        // Single-accept semantics: one pending connection is all we take.
        socket.listen(1).map_err(map_io_error)?;

        let listener: TcpListener = socket.into();
        listener.set_nonblocking(true).map_err(map_io_error)?;
        *self.bound.lock() = listener.local_addr().ok();
        Ok(listener)
    }

    /// Banner exchange over a freshly accepted/connected stream. The
    /// exchange runs under a read-timeout tick so a cancellation (or a
    /// peer that never sends its banner) cannot park the attempt thread.
    fn establish(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        cancel: &CancelToken,
    ) -> Result<Box<dyn SessionSocket>, ConnectError> {
        stream
            .set_nonblocking(false)
            .map_err(|e| ConnectError::ConnectFailed(e.to_string()))?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("failed to set TCP_NODELAY: {}", e);
        }

        let tick = Duration::from_millis(BANNER_POLL_INTERVAL_MS);
        stream
            .set_read_timeout(Some(tick))
            .map_err(|e| ConnectError::ConnectFailed(e.to_string()))?;
        stream
            .set_write_timeout(Some(tick))
            .map_err(|e| ConnectError::ConnectFailed(e.to_string()))?;

        let mut sock = TcpSessionSocket::new(stream);
        let remote = match handshake::exchange(&mut sock, &self.banner, cancel) {
            Ok(remote) => remote,
            Err(e) => {
                // Partially created socket must not leak past a failure.
                let _ = sock.shutdown();
                return Err(e);
            }
        };

        // Session reads and writes block normally again.
        sock.stream
            .set_read_timeout(None)
            .map_err(|e| ConnectError::ConnectFailed(e.to_string()))?;
        sock.stream
            .set_write_timeout(None)
            .map_err(|e| ConnectError::ConnectFailed(e.to_string()))?;

        tracing::info!("session established with {} ({})", remote.name, addr);
        sock.set_peer(PeerHandle {
            address: addr,
            name: remote.name,
        });
        Ok(Box::new(sock))
    }
}

impl Transport for TcpTransport {
    fn listen(&self, cancel: &CancelToken) -> Result<Box<dyn SessionSocket>, ConnectError> {
        let listener = self.bind_listener()?;
        tracing::info!(
            "listening on {}:{} as {}",
            self.config.bind_address,
            self.config.port,
            self.banner.name
        );

        loop {
            if cancel.is_cancelled() {
                // Dropping the listener closes the rendezvous point.
                return Err(ConnectError::Cancelled);
            }

            match listener.accept() {
                Ok((stream, addr)) => {
                    drop(listener);
                    return self.establish(stream, addr, cancel);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(ACCEPT_POLL_INTERVAL_MS));
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(map_io_error(e)),
            }
        }
    }

    fn connect(
        &self,
        peer: &PeerHandle,
        cancel: &CancelToken,
    ) -> Result<Box<dyn SessionSocket>, ConnectError> {
        if cancel.is_cancelled() {
            return Err(ConnectError::Cancelled);
        }

        tracing::info!("connecting to {}", peer);
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let stream = TcpStream::connect_timeout(&peer.address, timeout).map_err(map_io_error)?;

        if cancel.is_cancelled() {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(ConnectError::Cancelled);
        }

        self.establish(stream, peer.address, cancel)
    }
}

/// Map transport-level I/O failures onto the connect error kinds.
fn map_io_error(e: io::Error) -> ConnectError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => ConnectError::PermissionDenied,
        io::ErrorKind::AddrNotAvailable | io::ErrorKind::NetworkDown => {
            ConnectError::TransportUnavailable(e.to_string())
        }
        _ => ConnectError::ConnectFailed(e.to_string()),
    }
}
