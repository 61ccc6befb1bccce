//! Feature extraction: raw audio window → fixed-shape feature map.
//!
//! The `FeatureExtractor` trait is the seam between the detection cycle and
//! the DSP frontend: swap in [`SpectrogramExtractor`] (default) or any other
//! frontend producing the same shape without touching the cycle logic.

pub mod spectrogram;

pub use spectrogram::SpectrogramExtractor;

use crate::buffering::RingReader;
use crate::error::Result;

/// Dimensions of the feature map, a pure function of the four window
/// constants. Constant across every cycle of a given configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureShape {
    /// Time frames: `(audio_window_len − window_size) / hop_size + 1`.
    pub frames: usize,
    /// Frequency bins after pooling: `(window_size / 2) / pooling`, floor —
    /// spectrum bins past the last complete pooling group are dropped.
    pub bins: usize,
}

impl FeatureShape {
    pub fn from_params(
        audio_window_len: usize,
        window_size: usize,
        hop_size: usize,
        pooling: usize,
    ) -> Self {
        Self {
            frames: (audio_window_len - window_size) / hop_size + 1,
            bins: (window_size / 2) / pooling,
        }
    }

    /// Total values in the row-major `frames × bins` map.
    pub fn len(&self) -> usize {
        self.frames * self.bins
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Contract for DSP frontends feeding the inference engine.
///
/// Implementors may hold scratch state but must be deterministic: identical
/// input samples produce an identical feature map.
pub trait FeatureExtractor: Send {
    /// Shape of the map written by [`extract`](Self::extract).
    fn shape(&self) -> FeatureShape;

    /// Consume one audio window from `reader` and write the feature map into
    /// `out` (row-major, `shape().len()` values).
    fn extract(&mut self, reader: &mut RingReader, out: &mut [f32]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_shape_is_124_by_42() {
        let shape = FeatureShape::from_params(16_000, 256, 128, 3);
        assert_eq!(shape.frames, 124);
        assert_eq!(shape.bins, 42);
        assert_eq!(shape.len(), 124 * 42);
    }

    #[test]
    fn pooling_remainder_bins_are_dropped() {
        // 256/2 = 128 spectrum bins; 128/3 = 42 complete groups, 2 dropped.
        let shape = FeatureShape::from_params(512, 256, 128, 3);
        assert_eq!(shape.bins, 42);
        assert_eq!(shape.frames, 3);
    }
}
