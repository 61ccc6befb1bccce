//! Shared audio ring buffer with rewindable read accessors.
//!
//! The capture producer owns a [`RingWriter`] and appends continuously; the
//! detection cycle acquires a short-lived [`RingReader`] per cycle, rewinds it
//! over already-written history, and consumes forward. The buffer is fixed
//! capacity and overwrites its oldest samples once full.
//!
//! A `parking_lot::Mutex` guards the sample store, so a reader can never
//! observe a half-written sample. The lock is held only for bounded slice
//! copies. Alongside the modular write position the ring tracks a monotonic
//! `total_written` count, which is what gives readers a consistent view of
//! availability (it never shrinks).

pub mod reader;

pub use reader::RingReader;

use std::sync::Arc;

use parking_lot::Mutex;

/// Interior ring state. The modular write position is derived from
/// `total_written % capacity`, so the two can never disagree.
pub(crate) struct RingState {
    pub(crate) samples: Box<[f32]>,
    pub(crate) total_written: u64,
}

impl RingState {
    fn write(&mut self, incoming: &[f32]) {
        let cap = self.samples.len();
        // A slice longer than the buffer leaves only its tail behind; the
        // write count still advances by the full length.
        let skip = incoming.len().saturating_sub(cap);
        let mut pos = ((self.total_written + skip as u64) % cap as u64) as usize;
        for &s in &incoming[skip..] {
            self.samples[pos] = s;
            pos = (pos + 1) % cap;
        }
        self.total_written += incoming.len() as u64;
    }
}

/// Fixed-capacity circular store of mono f32 PCM samples.
///
/// Created once at startup and shared by handle: [`writer`](Self::writer) for
/// the capture producer, [`reader`](Self::reader) for each detection cycle.
#[derive(Clone)]
pub struct SampleRing {
    inner: Arc<Mutex<RingState>>,
    capacity: usize,
}

impl SampleRing {
    /// Create a ring holding `capacity` samples.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            inner: Arc::new(Mutex::new(RingState {
                samples: vec![0f32; capacity].into_boxed_slice(),
                total_written: 0,
            })),
            capacity,
        }
    }

    /// Producer handle. Multiple writers are possible but the intended
    /// topology is single-writer/single-reader.
    pub fn writer(&self) -> RingWriter {
        RingWriter {
            inner: Arc::clone(&self.inner),
        }
    }

    /// New accessor positioned at the current write cursor. O(1); takes the
    /// lock only to snapshot the write count.
    pub fn reader(&self) -> RingReader {
        let position = self.inner.lock().total_written;
        RingReader::new(Arc::clone(&self.inner), self.capacity, position)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total samples ever written (monotonic, never wraps down).
    pub fn total_written(&self) -> u64 {
        self.inner.lock().total_written
    }
}

/// Producer handle appending samples to a [`SampleRing`].
pub struct RingWriter {
    inner: Arc<Mutex<RingState>>,
}

impl RingWriter {
    /// Append samples, overwriting the oldest data when the ring is full.
    /// Takes the lock once per slice.
    pub fn push_slice(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        self.inner.lock().write(samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ring_is_empty() {
        let ring = SampleRing::with_capacity(64);
        assert_eq!(ring.capacity(), 64);
        assert_eq!(ring.total_written(), 0);
        assert_eq!(ring.reader().available(), 0);
    }

    #[test]
    fn write_then_read_back_in_order() {
        let ring = SampleRing::with_capacity(16);
        let mut writer = ring.writer();
        writer.push_slice(&[1.0, 2.0, 3.0, 4.0]);

        let mut reader = ring.reader();
        assert_eq!(reader.rewind(4), 4);

        let mut out = [0f32; 4];
        assert_eq!(reader.read_into(&mut out), 4);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn overwrite_keeps_newest_samples() {
        let ring = SampleRing::with_capacity(4);
        let mut writer = ring.writer();
        writer.push_slice(&[1.0, 2.0, 3.0, 4.0]);
        writer.push_slice(&[5.0, 6.0]);

        let mut reader = ring.reader();
        // Only 4 samples of history remain despite 6 ever written.
        assert_eq!(reader.rewind(6), 4);

        let mut out = [0f32; 4];
        assert_eq!(reader.read_into(&mut out), 4);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn slice_longer_than_capacity_keeps_tail() {
        let ring = SampleRing::with_capacity(3);
        let mut writer = ring.writer();
        writer.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(ring.total_written(), 5);

        let mut reader = ring.reader();
        assert_eq!(reader.rewind(100), 3);
        let mut out = [0f32; 3];
        assert_eq!(reader.read_into(&mut out), 3);
        assert_eq!(out, [3.0, 4.0, 5.0]);
    }

    #[test]
    fn reader_starts_at_write_cursor() {
        let ring = SampleRing::with_capacity(8);
        let mut writer = ring.writer();
        writer.push_slice(&[1.0, 2.0]);

        let mut reader = ring.reader();
        assert_eq!(reader.available(), 0);
        let mut out = [0f32; 2];
        assert_eq!(reader.read_into(&mut out), 0);
    }

    #[test]
    fn reader_sees_samples_written_after_acquisition() {
        let ring = SampleRing::with_capacity(8);
        let reader_ring = ring.clone();
        let mut writer = ring.writer();

        let mut reader = reader_ring.reader();
        assert_eq!(reader.available(), 0);

        writer.push_slice(&[7.0, 8.0, 9.0]);
        // Availability is monotonic: it can only have grown.
        assert_eq!(reader.available(), 3);

        let mut out = [0f32; 3];
        assert_eq!(reader.read_into(&mut out), 3);
        assert_eq!(out, [7.0, 8.0, 9.0]);
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn concurrent_writes_never_tear_reads() {
        use std::thread;

        let ring = SampleRing::with_capacity(1024);
        let mut writer = ring.writer();

        let producer = thread::spawn(move || {
            for block in 0..64 {
                writer.push_slice(&vec![block as f32; 128]);
            }
        });

        // Each drained block must consist of whole written values; a torn
        // read would surface as a fractional or garbage sample.
        for _ in 0..32 {
            let mut reader = ring.reader();
            let rewound = reader.rewind(256);
            let mut out = vec![0f32; rewound];
            let n = reader.read_into(&mut out);
            for &s in &out[..n] {
                assert_eq!(s.fract(), 0.0);
                assert!((0.0..64.0).contains(&s));
            }
        }

        producer.join().expect("producer thread panicked");
    }
}
