//! Audio frame type

use bytes::Bytes;

/// A fixed-capacity buffer of raw PCM bytes: the unit moved between the
/// audio devices and the wire. Frames carry no header, sequence number, or
/// length prefix; on the wire they dissolve into a continuous byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    payload: Bytes,
}

impl AudioFrame {
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    pub fn from_slice(pcm: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(pcm),
        }
    }

    /// A frame of silence (zeroed samples).
    pub fn silence(len: usize) -> Self {
        Self {
            payload: Bytes::from(vec![0u8; len]),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.payload
    }
}

impl AsRef<[u8]> for AudioFrame {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}
