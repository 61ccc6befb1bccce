//! Pooled log-power spectrogram frontend.
//!
//! Per extraction: consume exactly `audio_window_len` samples from the
//! accessor, slide a Hann window of `window_size` samples at `hop_size`
//! stride, FFT each frame, mean-pool the power spectrum in non-overlapping
//! groups of `pooling` bins, and log-scale. All buffers are allocated at
//! construction; `extract` itself allocates nothing.

use std::sync::Arc;

use ndarray::ArrayViewMut2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::{FeatureExtractor, FeatureShape};
use crate::buffering::RingReader;
use crate::error::{Result, VigilError};

/// Floor added before the log so silent bins stay finite.
const LOG_FLOOR: f32 = 1e-6;

pub struct SpectrogramExtractor {
    shape: FeatureShape,
    hop_size: usize,
    pooling: usize,
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    /// One audio window per cycle, refilled from the accessor.
    window_samples: Vec<f32>,
    /// FFT working buffer (`window_size` bins).
    fft_buf: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
}

impl SpectrogramExtractor {
    /// Plan the transform for a fixed parameter set.
    ///
    /// # Errors
    /// `VigilError::InvalidConfig` when any parameter is zero, the audio
    /// window is shorter than the transform window, or pooling swallows the
    /// whole spectrum.
    pub fn new(
        audio_window_len: usize,
        window_size: usize,
        hop_size: usize,
        pooling: usize,
    ) -> Result<Self> {
        if window_size == 0 || hop_size == 0 || pooling == 0 {
            return Err(VigilError::InvalidConfig(
                "window, hop and pooling must all be non-zero".into(),
            ));
        }
        if audio_window_len < window_size {
            return Err(VigilError::InvalidConfig(format!(
                "audio window ({audio_window_len}) shorter than transform window ({window_size})"
            )));
        }
        let shape = FeatureShape::from_params(audio_window_len, window_size, hop_size, pooling);
        if shape.bins == 0 {
            return Err(VigilError::InvalidConfig(format!(
                "pooling factor {pooling} leaves no bins of a {window_size}-point window"
            )));
        }

        let fft = FftPlanner::new().plan_fft_forward(window_size);
        let fft_scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        let hann = (0..window_size)
            .map(|i| {
                let phase = i as f32 / (window_size - 1) as f32;
                0.5 - 0.5 * (std::f32::consts::TAU * phase).cos()
            })
            .collect();

        Ok(Self {
            shape,
            hop_size,
            pooling,
            fft,
            hann,
            window_samples: vec![0f32; audio_window_len],
            fft_buf: vec![Complex::default(); window_size],
            fft_scratch,
        })
    }
}

impl FeatureExtractor for SpectrogramExtractor {
    fn shape(&self) -> FeatureShape {
        self.shape
    }

    fn extract(&mut self, reader: &mut RingReader, out: &mut [f32]) -> Result<()> {
        let expected = self.shape.len();
        if out.len() != expected {
            return Err(VigilError::ShapeMismatch {
                expected,
                got: out.len(),
            });
        }

        // Fill the audio window. When a clamped rewind left fewer samples
        // than the window needs, the head is silence (capture had not started
        // that far back).
        let len = self.window_samples.len();
        let available = reader.available().min(len);
        let pad = len - available;
        self.window_samples[..pad].fill(0.0);
        reader.read_into(&mut self.window_samples[pad..]);

        let mut grid = ArrayViewMut2::from_shape((self.shape.frames, self.shape.bins), out)
            .map_err(|e| anyhow::anyhow!("feature map view: {e}"))?;

        for f in 0..self.shape.frames {
            let start = f * self.hop_size;
            for (i, slot) in self.fft_buf.iter_mut().enumerate() {
                *slot = Complex::new(self.window_samples[start + i] * self.hann[i], 0.0);
            }
            self.fft
                .process_with_scratch(&mut self.fft_buf, &mut self.fft_scratch);

            for b in 0..self.shape.bins {
                let group = &self.fft_buf[b * self.pooling..(b + 1) * self.pooling];
                let power: f32 = group.iter().map(|c| c.re * c.re + c.im * c.im).sum();
                grid[[f, b]] = (power / self.pooling as f32 + LOG_FLOOR).ln();
            }
        }

        Ok(())
    }
}
