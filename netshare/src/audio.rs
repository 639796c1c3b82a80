//! Rolling audio buffer for the wake-word path.
//!
//! A recorder thread pushes fixed-size frames while the verifier takes
//! snapshots. A snapshot is a copy made under the lock, so verification never
//! reads samples that are still being overwritten.

use std::sync::{Mutex, PoisonError};
use tracing::debug;

#[derive(Debug)]
struct Ring {
    samples: Vec<i16>,
    /// Slot the next frame is written to; also the oldest slot once full
    next: usize,
    written: u64,
}

/// Fixed-capacity ring of `i16` audio frames
#[derive(Debug)]
pub struct SampleRing {
    frame_len: usize,
    frames: usize,
    inner: Mutex<Ring>,
}

impl SampleRing {
    /// A ring of `frames` slots of `frame_len` samples each. Both are at least 1.
    pub fn new(frame_len: usize, frames: usize) -> Self {
        let frame_len = frame_len.max(1);
        let frames = frames.max(1);
        Self {
            frame_len,
            frames,
            inner: Mutex::new(Ring {
                samples: vec![0; frame_len * frames],
                next: 0,
                written: 0,
            }),
        }
    }

    /// Size the ring to hold `seconds` of audio at `sample_rate`
    pub fn for_seconds(sample_rate: u32, frame_len: usize, seconds: u32) -> Self {
        let total = sample_rate as usize * seconds as usize;
        Self::new(frame_len, total / frame_len.max(1))
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Number of frame slots
    pub fn capacity(&self) -> usize {
        self.frames
    }

    /// Frames pushed since creation
    pub fn frames_written(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .written
    }

    /// Overwrite the oldest slot with `frame`.
    ///
    /// A short frame is zero-padded, a long one truncated to the frame length.
    pub fn push_frame(&self, frame: &[i16]) {
        let n = frame.len().min(self.frame_len);
        if frame.len() > self.frame_len {
            debug!(
                len = frame.len(),
                frame_len = self.frame_len,
                "truncating oversized audio frame"
            );
        }
        let mut ring = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let start = ring.next * self.frame_len;
        let slot = &mut ring.samples[start..start + self.frame_len];
        slot[..n].copy_from_slice(&frame[..n]);
        slot[n..].fill(0);
        ring.next = (ring.next + 1) % self.frames;
        ring.written += 1;
    }

    /// Copy of the whole ring, oldest frame first.
    ///
    /// Slots never written yet read as silence.
    pub fn snapshot(&self) -> Vec<i16> {
        let ring = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let split = ring.next * self.frame_len;
        let mut out = Vec::with_capacity(ring.samples.len());
        out.extend_from_slice(&ring.samples[split..]);
        out.extend_from_slice(&ring.samples[..split]);
        out
    }
}
