//! ONNX wake-phrase classifier via the `ort` crate.
//!
//! Expects a feed-forward binary classifier exported with a sigmoid output:
//!
//! | Name     | Shape                | DType | Direction |
//! |----------|----------------------|-------|-----------|
//! | `input`  | `[1, frames, bins]`  | f32   | in        |
//! | `output` | `[1, 1]`             | f32   | out       |
//!
//! Tensor names are resolved tolerantly since exports differ between
//! toolchains.

use std::path::Path;

use ndarray::Array3;
use ort::session::builder::SessionBuilder;
use ort::session::SessionInputValue;
use ort::value::Value;
use tracing::info;

use crate::error::{Result, VigilError};
use crate::features::FeatureShape;
use crate::inference::WakeClassifier;

/// Binary wake classifier backed by an ONNX session.
pub struct OnnxWakeModel {
    session: ort::session::Session,
    input_name: String,
    output_name: String,
    shape: FeatureShape,
}

impl OnnxWakeModel {
    /// Load the classifier from `path` for feature maps of `shape`.
    pub fn new(path: impl AsRef<Path>, shape: FeatureShape) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VigilError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        let session = SessionBuilder::new()
            .map_err(|e| VigilError::OnnxSession(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| VigilError::OnnxSession(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();
        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();

        let input_name = resolve_name(&input_names, &["input", "spectrogram", "x"])
            .or_else(|| input_names.first().cloned())
            .ok_or_else(|| VigilError::OnnxSession("wake model has no inputs".into()))?;
        let output_name = resolve_name(&output_names, &["output", "probability", "prob"])
            .or_else(|| output_names.first().cloned())
            .ok_or_else(|| VigilError::OnnxSession("wake model has no outputs".into()))?;

        info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            frames = shape.frames,
            bins = shape.bins,
            "ONNX wake model loaded"
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            shape,
        })
    }

    fn run(&mut self, features: &[f32]) -> Result<f32> {
        let input_arr =
            Array3::<f32>::from_shape_vec((1, self.shape.frames, self.shape.bins), features.to_vec())
                .map_err(|e| VigilError::OnnxSession(e.to_string()))?;
        let input_val = Value::from_array(input_arr)
            .map_err(|e: ort::Error| VigilError::OnnxSession(e.to_string()))?;

        let input_values: Vec<(String, SessionInputValue<'_>)> =
            vec![(self.input_name.clone(), input_val.into())];

        let outputs = self
            .session
            .run(input_values)
            .map_err(|e| VigilError::OnnxSession(e.to_string()))?;

        let prob_output = outputs
            .get(self.output_name.as_str())
            .unwrap_or(&outputs[0]);
        let (_, prob_data) = prob_output
            .try_extract_tensor::<f32>()
            .map_err(|e| VigilError::OnnxSession(e.to_string()))?;

        Ok(prob_data.first().copied().unwrap_or(0.0))
    }
}

fn resolve_name(candidates: &[String], preferred: &[&str]) -> Option<String> {
    preferred.iter().find_map(|needle| {
        candidates
            .iter()
            .find(|name| name.eq_ignore_ascii_case(needle))
            .cloned()
    })
}

impl WakeClassifier for OnnxWakeModel {
    fn warm_up(&mut self) -> Result<()> {
        // One zero-tensor pass to populate session caches.
        let zeros = vec![0f32; self.shape.len()];
        self.run(&zeros)?;
        info!("ONNX wake model warmed up");
        Ok(())
    }

    fn infer(&mut self, features: &[f32]) -> Result<f32> {
        if features.len() != self.shape.len() {
            return Err(VigilError::ShapeMismatch {
                expected: self.shape.len(),
                got: features.len(),
            });
        }
        self.run(features)
    }
}
