//! # vigil-core
//!
//! Always-on wake-phrase detection engine.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → AudioCapture → SampleRing (continuously overwritten)
//!                                  │
//!                        RingReader ← rewind(1 s)      (fresh per cycle)
//!                                  │
//!                        SpectrogramExtractor
//!                                  │
//!                        WakeEngine::predict → p ∈ [0, 1]
//!                                  │
//!                        HysteresisGate → detection boolean
//! ```
//!
//! The outer scheduler drives a [`DetectorState`]: `enter` once, `run` per
//! cycle, `exit` when leaving the state. The capture producer fills the ring
//! asynchronously the whole time; a cycle never blocks it.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[cfg(feature = "audio-cpal")]
pub mod audio;
pub mod buffering;
pub mod detect;
pub mod error;
pub mod features;
pub mod inference;

// Convenience re-exports for downstream crates
pub use buffering::{RingReader, RingWriter, SampleRing};
pub use detect::{DetectConfig, DetectorState, WakeDetectState};
pub use error::VigilError;
pub use features::{FeatureExtractor, FeatureShape, SpectrogramExtractor};
pub use inference::{WakeClassifier, WakeEngine};

#[cfg(feature = "audio-cpal")]
pub use audio::AudioCapture;

#[cfg(feature = "onnx")]
pub use inference::OnnxWakeModel;
