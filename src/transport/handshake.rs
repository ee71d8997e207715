//! Service banner exchange
//!
//! A transport with an out-of-band service registry (Bluetooth SDP) can
//! match the service identifier before a socket ever exists. Plain byte
//! streams cannot, so each side writes one small banner immediately after
//! the connection is established and reads the peer's in return:
//!
//! ```text
//! [MAGIC(4) "PWTK"][VERSION(1)][SERVICE_UUID(16)][NAME_LEN(1)][NAME(variable)]
//! ```
//!
//! A mismatched magic, version, or service identifier fails the attempt.
//! Everything after the banner is the unframed PCM audio stream.

use bytes::{BufMut, BytesMut};
use std::io;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::constants::{BANNER_EXCHANGE_TIMEOUT_MS, SERVICE_NAME, SERVICE_UUID};
use crate::error::ConnectError;
use crate::transport::{CancelToken, SessionSocket};

/// Magic bytes opening every banner
const BANNER_MAGIC: &[u8; 4] = b"PWTK";

/// Banner format version
const BANNER_VERSION: u8 = 1;

/// Fixed-size portion of the banner: magic, version, uuid, name length.
const BANNER_HEADER_LEN: usize = 4 + 1 + 16 + 1;

/// Identity announced to the remote peer during connection setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBanner {
    /// Service identifier; sessions only form between equal identifiers
    pub service_id: Uuid,
    /// Display name of the announcing peer
    pub name: String,
}

impl ServiceBanner {
    /// Banner for this crate's fixed service identity.
    pub fn local(name: &str) -> Self {
        Self {
            service_id: SERVICE_UUID,
            name: if name.is_empty() {
                SERVICE_NAME.to_string()
            } else {
                name.chars().take(255).collect()
            },
        }
    }

    /// Serialize to wire bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let name_bytes = self.name.as_bytes();
        let name_len = name_bytes.len().min(255);

        let mut buf = BytesMut::with_capacity(BANNER_HEADER_LEN + name_len);
        buf.put_slice(BANNER_MAGIC);
        buf.put_u8(BANNER_VERSION);
        buf.put_slice(self.service_id.as_bytes());
        buf.put_u8(name_len as u8);
        buf.put_slice(&name_bytes[..name_len]);

        buf.to_vec()
    }

    /// Parse the fixed header; returns the banner (name still empty) and
    /// the advertised name length.
    fn parse_header(data: &[u8; BANNER_HEADER_LEN]) -> Result<(Uuid, usize), ConnectError> {
        if &data[0..4] != BANNER_MAGIC {
            return Err(ConnectError::ConnectFailed(
                "remote endpoint is not a walkie-talkie service".to_string(),
            ));
        }
        if data[4] != BANNER_VERSION {
            return Err(ConnectError::ConnectFailed(format!(
                "unsupported banner version {}",
                data[4]
            )));
        }

        let mut raw = [0u8; 16];
        raw.copy_from_slice(&data[5..21]);
        Ok((Uuid::from_bytes(raw), data[21] as usize))
    }
}

/// Write our banner, read the peer's, and verify the service identifier.
///
/// Both sides write first and read second; the banner is far smaller than
/// any socket buffer, so the cross never deadlocks. The caller must arm a
/// read timeout on the socket so the reads tick instead of parking; each
/// tick re-checks the cancel token, and a peer that never sends a banner
/// fails the attempt after a fixed deadline.
pub fn exchange(
    sock: &mut dyn SessionSocket,
    ours: &ServiceBanner,
    cancel: &CancelToken,
) -> Result<ServiceBanner, ConnectError> {
    sock.write_all(&ours.serialize())
        .map_err(|e| ConnectError::ConnectFailed(format!("banner write failed: {e}")))?;

    let deadline = Instant::now() + Duration::from_millis(BANNER_EXCHANGE_TIMEOUT_MS);

    let mut header = [0u8; BANNER_HEADER_LEN];
    read_banner(sock, &mut header, cancel, deadline)?;

    let (service_id, name_len) = ServiceBanner::parse_header(&header)?;

    let mut name_buf = vec![0u8; name_len];
    read_banner(sock, &mut name_buf, cancel, deadline)?;

    if service_id != ours.service_id {
        return Err(ConnectError::ConnectFailed(format!(
            "service identifier mismatch: expected {}, got {}",
            ours.service_id, service_id
        )));
    }

    Ok(ServiceBanner {
        service_id,
        name: String::from_utf8_lossy(&name_buf).to_string(),
    })
}

/// Fill `buf` from the socket, tolerating read-timeout ticks. Bails out
/// when the token trips or the deadline passes.
fn read_banner(
    sock: &mut dyn SessionSocket,
    buf: &mut [u8],
    cancel: &CancelToken,
    deadline: Instant,
) -> Result<(), ConnectError> {
    let mut filled = 0;
    while filled < buf.len() {
        if cancel.is_cancelled() {
            return Err(ConnectError::Cancelled);
        }
        if Instant::now() > deadline {
            return Err(ConnectError::ConnectFailed(
                "banner exchange timed out".to_string(),
            ));
        }
        match sock.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(ConnectError::ConnectFailed(
                    "connection closed during banner exchange".to_string(),
                ))
            }
            Ok(n) => filled += n,
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock
                        | io::ErrorKind::TimedOut
                        | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                return Err(ConnectError::ConnectFailed(format!(
                    "banner read failed: {e}"
                )))
            }
        }
    }
    Ok(())
}
