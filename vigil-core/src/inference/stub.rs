//! `EnergyStub` — placeholder backend that scores mean feature energy.
//!
//! Used during bring-up before a trained model is integrated: it exercises
//! the full cycle (buffer ownership, prediction, hysteresis) with a
//! deterministic, monotonic response to input loudness.

use tracing::debug;

use crate::error::Result;
use crate::inference::WakeClassifier;

/// Logistic-of-mean-energy stub classifier.
///
/// `p = 1 / (1 + exp(-gain · (mean(features) − bias)))`
pub struct EnergyStub {
    bias: f32,
    gain: f32,
}

impl EnergyStub {
    pub fn new(bias: f32, gain: f32) -> Self {
        Self { bias, gain }
    }
}

impl Default for EnergyStub {
    fn default() -> Self {
        // Centered on the log floor of a quiet room; louder windows push the
        // score toward 1.
        Self::new(-9.0, 1.5)
    }
}

impl WakeClassifier for EnergyStub {
    fn warm_up(&mut self) -> Result<()> {
        debug!("EnergyStub::warm_up — no-op");
        Ok(())
    }

    fn infer(&mut self, features: &[f32]) -> Result<f32> {
        if features.is_empty() {
            return Ok(0.0);
        }
        let mean = features.iter().sum::<f32>() / features.len() as f32;
        let p = 1.0 / (1.0 + (-self.gain * (mean - self.bias)).exp());
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_stays_in_unit_interval() {
        let mut stub = EnergyStub::default();
        for level in [-80.0f32, -9.0, 0.0, 40.0] {
            let p = stub.infer(&vec![level; 64]).unwrap();
            assert!((0.0..=1.0).contains(&p), "p={p} for level={level}");
        }
    }

    #[test]
    fn louder_windows_score_higher() {
        let mut stub = EnergyStub::default();
        let quiet = stub.infer(&vec![-13.0; 64]).unwrap();
        let loud = stub.infer(&vec![-2.0; 64]).unwrap();
        assert!(loud > quiet);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let mut stub = EnergyStub::default();
        let features: Vec<f32> = (0..32).map(|i| i as f32 * 0.1 - 10.0).collect();
        assert_eq!(
            stub.infer(&features).unwrap(),
            stub.infer(&features).unwrap()
        );
    }

    #[test]
    fn empty_features_score_zero() {
        let mut stub = EnergyStub::default();
        assert_eq!(stub.infer(&[]).unwrap(), 0.0);
    }
}
