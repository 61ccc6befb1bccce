//! Rewindable read accessor over a [`SampleRing`](super::SampleRing).
//!
//! A `RingReader` is acquired fresh at the start of each detection cycle and
//! dropped at its end — it must not outlive the cycle. Its position is an
//! absolute sample index into the stream of everything ever written, so
//! rewinding and forward reads are simple arithmetic against the ring's
//! monotonic write count.

use std::sync::Arc;

use parking_lot::Mutex;

use super::RingState;

/// Transient read cursor with bounded rewind.
pub struct RingReader {
    inner: Arc<Mutex<RingState>>,
    capacity: usize,
    /// Absolute position in the sample stream (not a modular index).
    position: u64,
}

impl RingReader {
    pub(crate) fn new(inner: Arc<Mutex<RingState>>, capacity: usize, position: u64) -> Self {
        Self {
            inner,
            capacity,
            position,
        }
    }

    /// Move the read position backward by up to `n` samples.
    ///
    /// The position is clamped to the oldest sample still resident in the
    /// ring (and never before sample 0, when fewer than `n` samples have been
    /// captured since creation). Returns the count actually rewound; callers
    /// that need a fixed-length window treat the shortfall as leading
    /// silence.
    pub fn rewind(&mut self, n: usize) -> usize {
        let state = self.inner.lock();
        let oldest = state.total_written.saturating_sub(self.capacity as u64);
        let target = self.position.saturating_sub(n as u64).max(oldest);
        let moved = (self.position - target) as usize;
        self.position = target;
        moved
    }

    /// Samples between the read position and the producer's live write
    /// cursor. Monotonic for a given reader: concurrent writes only grow it.
    pub fn available(&self) -> usize {
        let state = self.inner.lock();
        state.total_written.saturating_sub(self.position) as usize
    }

    /// Copy samples forward into `out`, advancing the read position.
    ///
    /// Reads never pass the write cursor; returns how many samples were
    /// copied. If the producer laps this reader mid-cycle (more than
    /// `capacity` samples written while it is held), the lapped slots yield
    /// the overwriting samples — the fresh-reader-per-cycle protocol keeps
    /// that from happening in steady state.
    pub fn read_into(&mut self, out: &mut [f32]) -> usize {
        let state = self.inner.lock();
        let available = state.total_written.saturating_sub(self.position);
        let n = (out.len() as u64).min(available) as usize;
        for (i, slot) in out[..n].iter_mut().enumerate() {
            let idx = ((self.position + i as u64) % self.capacity as u64) as usize;
            *slot = state.samples[idx];
        }
        drop(state);
        self.position += n as u64;
        n
    }

    /// Absolute stream position of this reader.
    pub fn position(&self) -> u64 {
        self.position
    }
}
