//! Sample-rate conversion for the capture path, via rubato `FastFixedIn`.
//!
//! Microphones commonly deliver 44.1/48 kHz; the classifier window is
//! specified at 16 kHz. The feeder thread runs incoming staging audio through
//! a `RateConverter` before it reaches the sample ring. When the rates
//! already match no rubato session is created and input passes through
//! untouched.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::warn;

use crate::error::{Result, VigilError};

/// Converts mono f32 audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Holds partial input between calls until a full chunk accumulates.
    pending: Vec<f32>,
    /// Input frames rubato consumes per call.
    chunk_size: usize,
    /// Pre-allocated rubato output: `[1][output_frames_max]`.
    scratch: Vec<Vec<f32>>,
}

impl RateConverter {
    /// # Errors
    /// `VigilError::AudioDevice` if rubato rejects the rate pair.
    pub fn new(source_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
                chunk_size,
                scratch: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / source_rate as f64;
        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio, no dynamic adjustment
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| VigilError::AudioDevice(format!("resampler init: {e}")))?;

        let scratch = vec![vec![0f32; resampler.output_frames_max()]; 1];

        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::new(),
            chunk_size,
            scratch,
        })
    }

    /// Convert `samples`, appending any produced output to `out`.
    ///
    /// Input is buffered internally until a full `chunk_size` block is
    /// available, so a call may append nothing.
    pub fn process_into(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        let Some(ref mut resampler) = self.resampler else {
            out.extend_from_slice(samples);
            return;
        };

        self.pending.extend_from_slice(samples);

        while self.pending.len() >= self.chunk_size {
            let block = &self.pending[..self.chunk_size];
            match resampler.process_into_buffer(&[block], &mut self.scratch, None) {
                Ok((_consumed, produced)) => out.extend_from_slice(&self.scratch[0][..produced]),
                Err(e) => warn!("resampler process error: {e}"),
            }
            self.pending.drain(..self.chunk_size);
        }
    }

    /// `true` when no rate conversion happens.
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
