//! Detector state lifecycle.
//!
//! The `DetectorState` trait is the contract the outer scheduler drives:
//! `enter` → any number of `run` cycles → `exit`. States are swappable
//! values, not an inheritance hierarchy; [`WakeDetectState`] is the one state
//! this crate ships.

pub mod stats;
pub mod wake;

pub use stats::{CycleStats, HysteresisGate};
pub use wake::{ClassifierFactory, MemoryProbe, WakeDetectState};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};
use crate::features::FeatureShape;

/// Lifecycle capability set consumed by the outer scheduler.
///
/// No cycle may run before `enter` or after `exit`; re-entry after an exit
/// re-initializes the state from scratch.
pub trait DetectorState: Send {
    /// Acquire the state's resources. Construction failure aborts entry —
    /// the state stays inactive.
    fn enter(&mut self) -> Result<()>;

    /// One detection cycle. Returns `true` when the wake phrase was detected
    /// this cycle; the caller decides whether to transition.
    fn run(&mut self) -> Result<bool>;

    /// Release the state's resources deterministically.
    fn exit(&mut self) -> Result<()>;
}

/// All tunables of the detection cycle, defaulting to the reference
/// constants. Compile-time in the original firmware; a value set here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Transform window size W (samples). Default: 256.
    pub window_size: usize,
    /// Hop S between transform windows (samples). Default: 128.
    pub hop_size: usize,
    /// Non-overlapping pooling factor P along the frequency axis. Default: 3.
    pub pooling: usize,
    /// Audio window L consumed per cycle (samples). Default: 16000 (1 s).
    pub audio_window_len: usize,
    /// Probability above which a cycle counts as an exceedance. Default: 0.95.
    pub detection_threshold: f32,
    /// Exceedance count at which a detection fires. Default: 2.
    pub required_exceedances: u32,
    /// Latency EMA smoothing factor α. Default: 0.1.
    pub ema_alpha: f64,
    /// Cycles between average-latency log lines. Default: 100.
    pub latency_log_interval: u64,
    /// Assumed capture rate (Hz); the capture path converts to this.
    /// Default: 16000.
    pub sample_rate: u32,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            window_size: 256,
            hop_size: 128,
            pooling: 3,
            audio_window_len: 16_000,
            detection_threshold: 0.95,
            required_exceedances: 2,
            ema_alpha: 0.1,
            latency_log_interval: 100,
            sample_rate: 16_000,
        }
    }
}

impl DetectConfig {
    /// Reject parameter sets the pipeline cannot run on.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.hop_size == 0 || self.pooling == 0 {
            return Err(VigilError::InvalidConfig(
                "window_size, hop_size and pooling must be non-zero".into(),
            ));
        }
        if self.audio_window_len < self.window_size {
            return Err(VigilError::InvalidConfig(format!(
                "audio_window_len ({}) shorter than window_size ({})",
                self.audio_window_len, self.window_size
            )));
        }
        if !(0.0..=1.0).contains(&self.detection_threshold) {
            return Err(VigilError::InvalidConfig(format!(
                "detection_threshold {} outside [0, 1]",
                self.detection_threshold
            )));
        }
        if self.required_exceedances == 0 {
            return Err(VigilError::InvalidConfig(
                "required_exceedances must be at least 1".into(),
            ));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(VigilError::InvalidConfig(format!(
                "ema_alpha {} outside (0, 1]",
                self.ema_alpha
            )));
        }
        if self.sample_rate == 0 {
            return Err(VigilError::InvalidConfig("sample_rate must be non-zero".into()));
        }
        Ok(())
    }

    /// Feature-map shape implied by the window constants.
    pub fn feature_shape(&self) -> FeatureShape {
        FeatureShape::from_params(
            self.audio_window_len,
            self.window_size,
            self.hop_size,
            self.pooling,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = DetectConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.feature_shape().frames, 124);
        assert_eq!(cfg.feature_shape().bins, 42);
    }

    #[test]
    fn degenerate_configs_are_rejected() {
        let mut cfg = DetectConfig::default();
        cfg.hop_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectConfig::default();
        cfg.audio_window_len = 100;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectConfig::default();
        cfg.detection_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectConfig::default();
        cfg.required_exceedances = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectConfig::default();
        cfg.ema_alpha = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn serde_round_trip_preserves_fields() {
        let mut cfg = DetectConfig::default();
        cfg.detection_threshold = 0.9;
        cfg.required_exceedances = 3;

        let json = serde_json::to_string(&cfg).unwrap();
        let back: DetectConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.detection_threshold, 0.9);
        assert_eq!(back.required_exceedances, 3);
        assert_eq!(back.audio_window_len, cfg.audio_window_len);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: DetectConfig = serde_json::from_str(r#"{"detection_threshold":0.8}"#).unwrap();
        assert_eq!(cfg.detection_threshold, 0.8);
        assert_eq!(cfg.window_size, 256);
        assert_eq!(cfg.latency_log_interval, 100);
    }
}
