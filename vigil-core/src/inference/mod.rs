//! Wake classifier abstraction.
//!
//! The `WakeClassifier` trait decouples the detection cycle from any specific
//! backend (stub logistic model, ONNX CNN, etc.). `&mut self` on `infer`
//! intentionally leaves room for stateful backends.

pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxWakeModel;

use tracing::debug;

use crate::error::{Result, VigilError};

/// Contract for binary wake-phrase classifier backends.
pub trait WakeClassifier: Send {
    /// One-time warm-up: load weights, pre-allocate, run a dummy pass.
    /// Called once when the engine is constructed.
    ///
    /// # Errors
    /// Returns an error if model files are missing or corrupt — fatal to the
    /// engine, no partial state survives.
    fn warm_up(&mut self) -> Result<()>;

    /// Score the feature map currently describing the audio window.
    /// A well-behaved backend returns a probability in [0, 1]; the engine
    /// rejects non-finite outputs and clamps the rest.
    fn infer(&mut self, features: &[f32]) -> Result<f32>;
}

/// Inference engine owning the input feature buffer and the classifier.
///
/// The buffer is allocated once at construction; `predict` can be called
/// repeatedly with fresh buffer contents without reallocation.
pub struct WakeEngine {
    input: Box<[f32]>,
    classifier: Box<dyn WakeClassifier>,
}

impl WakeEngine {
    /// Bind a classifier to an input buffer of `input_len` values and warm it
    /// up. Warm-up failure aborts construction.
    pub fn new(input_len: usize, mut classifier: Box<dyn WakeClassifier>) -> Result<Self> {
        classifier.warm_up()?;
        debug!(input_len, "wake engine ready");
        Ok(Self {
            input: vec![0f32; input_len].into_boxed_slice(),
            classifier,
        })
    }

    /// The mutable buffer clients populate before calling [`predict`](Self::predict).
    pub fn input_buffer(&mut self) -> &mut [f32] {
        &mut self.input
    }

    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    /// Run the classifier over the current buffer contents.
    ///
    /// The returned probability always lies in [0, 1]; a backend emitting
    /// NaN/infinity is reported as an inference error.
    pub fn predict(&mut self) -> Result<f32> {
        let raw = self.classifier.infer(&self.input)?;
        if !raw.is_finite() {
            return Err(VigilError::Inference(format!(
                "classifier produced a non-finite probability: {raw}"
            )));
        }
        Ok(raw.clamp(0.0, 1.0))
    }
}
