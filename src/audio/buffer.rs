//! Lock-free chunk ring between the session worker and the output device
//!
//! Single-producer single-consumer: the worker's receive duty pushes PCM
//! byte chunks exactly as they arrive off the wire, the real-time output
//! callback pops them. Bounded so a remote sending faster than the device
//! drains cannot grow memory; on overflow the oldest chunk is dropped,
//! which also keeps playback latency capped.

use bytes::Bytes;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Bounded SPSC queue of PCM byte chunks.
pub struct ChunkRing {
    queue: ArrayQueue<Bytes>,
    overflows: AtomicUsize,
    underruns: AtomicUsize,
}

impl ChunkRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflows: AtomicUsize::new(0),
            underruns: AtomicUsize::new(0),
        }
    }

    /// Push a chunk. When full, the oldest chunk is evicted first so the
    /// newest audio always wins.
    pub fn push(&self, chunk: Bytes) {
        let mut chunk = chunk;
        loop {
            match self.queue.push(chunk) {
                Ok(()) => return,
                Err(rejected) => {
                    self.overflows.fetch_add(1, Ordering::Relaxed);
                    let _ = self.queue.pop();
                    chunk = rejected;
                }
            }
        }
    }

    /// Pop the next chunk, counting an underrun when empty.
    pub fn pop(&self) -> Option<Bytes> {
        match self.queue.pop() {
            Some(chunk) => Some(chunk),
            None => {
                self.underruns.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Pop without counting an underrun.
    pub fn try_pop(&self) -> Option<Bytes> {
        self.queue.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn overflow_count(&self) -> usize {
        self.overflows.load(Ordering::Relaxed)
    }

    pub fn underrun_count(&self) -> usize {
        self.underruns.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a chunk ring.
pub type SharedChunkRing = Arc<ChunkRing>;

pub fn create_shared_ring(capacity: usize) -> SharedChunkRing {
    Arc::new(ChunkRing::new(capacity))
}
