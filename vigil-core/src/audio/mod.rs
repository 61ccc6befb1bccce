//! Microphone capture producer filling the sample ring.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It must not allocate (after the first resize), block on a mutex, or
//! perform I/O — so it cannot touch the mutex-guarded [`SampleRing`]
//! directly. Instead:
//!
//! ```text
//! cpal callback ──lock-free SPSC──► feeder thread ──RateConverter──► SampleRing
//! (mono mixdown)    (staging)        (drain + resample)              (writer)
//! ```
//!
//! The feeder thread is owned by [`AudioCapture`] and joined on drop, so the
//! producer side shuts down deterministically.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms. Create and drop
//! `AudioCapture` on the same OS thread.

pub mod resample;

pub use resample::RateConverter;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use tracing::{error, info, warn};

use crate::buffering::SampleRing;
use crate::error::{Result, VigilError};

/// Staging capacity between the callback and the feeder thread:
/// 2^18 = 262 144 f32 samples ≈ 5.5 s at 48 kHz.
const STAGING_CAPACITY: usize = 1 << 18;

/// Samples drained from staging per feeder iteration (20 ms at 48 kHz).
const DRAIN_CHUNK: usize = 960;

/// Feeder sleep when staging is empty (avoids busy-wait burning a core).
const SLEEP_EMPTY_MS: u64 = 5;

/// Handle to an active capture stream plus its feeder thread.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    _stream: cpal::Stream,
    running: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
    /// Actual device capture rate (Hz).
    pub sample_rate: u32,
}

impl AudioCapture {
    /// Open the system default microphone and feed `ring` with mono f32
    /// samples at `target_rate`.
    ///
    /// # Errors
    /// `VigilError::NoDefaultInputDevice` when no microphone is available,
    /// `VigilError::AudioStream` when cpal fails to build or start the
    /// stream.
    pub fn open_default(ring: &SampleRing, target_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(VigilError::NoDefaultInputDevice)?;

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| VigilError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;

        info!(sample_rate, channels, target_rate, "audio config selected");

        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (mut staging_prod, mut staging_cons) = HeapRb::<f32>::new(STAGING_CAPACITY).split();
        let running = Arc::new(AtomicBool::new(true));

        let running_f32 = Arc::clone(&running);
        let running_i16 = Arc::clone(&running);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                let mut mix_buf: Vec<f32> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _info| {
                        if !running_f32.load(Ordering::Relaxed) {
                            return;
                        }
                        mix_frames(data, channels, &mut mix_buf, |s| s);
                        let written = staging_prod.push_slice(&mix_buf);
                        if written < mix_buf.len() {
                            warn!(
                                "capture staging full: dropped {} frames",
                                mix_buf.len() - written
                            );
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
            }

            SampleFormat::I16 => {
                let mut mix_buf: Vec<f32> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _info| {
                        if !running_i16.load(Ordering::Relaxed) {
                            return;
                        }
                        mix_frames(data, channels, &mut mix_buf, |s| s as f32 / 32_768.0);
                        let written = staging_prod.push_slice(&mix_buf);
                        if written < mix_buf.len() {
                            warn!(
                                "capture staging full: dropped {} frames",
                                mix_buf.len() - written
                            );
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
            }

            fmt => {
                return Err(VigilError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| VigilError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| VigilError::AudioStream(e.to_string()))?;

        // Feeder: drain staging, rate-convert, append to the shared ring.
        let mut converter = RateConverter::new(sample_rate, target_rate, DRAIN_CHUNK)?;
        let mut writer = ring.writer();
        let feeder_running = Arc::clone(&running);
        let feeder = std::thread::Builder::new()
            .name("vigil-capture-feeder".into())
            .spawn(move || {
                let mut raw = vec![0f32; DRAIN_CHUNK];
                let mut converted = Vec::with_capacity(DRAIN_CHUNK);
                while feeder_running.load(Ordering::Relaxed) {
                    let n = staging_cons.pop_slice(&mut raw);
                    if n == 0 {
                        std::thread::sleep(Duration::from_millis(SLEEP_EMPTY_MS));
                        continue;
                    }
                    converted.clear();
                    converter.process_into(&raw[..n], &mut converted);
                    if !converted.is_empty() {
                        writer.push_slice(&converted);
                    }
                }
            })
            .map_err(|e| VigilError::AudioStream(format!("feeder spawn: {e}")))?;

        Ok(Self {
            _stream: stream,
            running,
            feeder: Some(feeder),
            sample_rate,
        })
    }

    /// Signal the callback and feeder to stop. Also happens on drop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
        if let Some(feeder) = self.feeder.take() {
            if feeder.join().is_err() {
                error!("capture feeder thread panicked");
            }
        }
    }
}

/// Mix interleaved frames down to mono into `out` (resized, no reallocation
/// after the first callback at a stable buffer size).
fn mix_frames<T: Copy>(data: &[T], channels: usize, out: &mut Vec<f32>, to_f32: impl Fn(T) -> f32) {
    let frames = data.len() / channels.max(1);
    out.resize(frames, 0.0);
    if channels <= 1 {
        for (slot, sample) in out.iter_mut().zip(data.iter()) {
            *slot = to_f32(*sample);
        }
        return;
    }
    for (f, slot) in out.iter_mut().enumerate() {
        let base = f * channels;
        let sum: f32 = data[base..base + channels].iter().map(|s| to_f32(*s)).sum();
        *slot = sum / channels as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixdown_mono_converts_in_place() {
        let mut out = Vec::new();
        mix_frames(&[1i16, -1, 16_384], 1, &mut out, |s| s as f32 / 32_768.0);
        assert_eq!(out.len(), 3);
        assert!((out[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mixdown_stereo_averages_channels() {
        let mut out = Vec::new();
        mix_frames(&[0.2f32, 0.4, -1.0, 1.0], 2, &mut out, |s| s);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!((out[1] - 0.0).abs() < 1e-6);
    }
}
