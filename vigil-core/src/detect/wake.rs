//! The wake-phrase detection state.
//!
//! One [`run`](crate::detect::DetectorState::run) cycle:
//!
//! ```text
//! reader = ring.reader()           // fresh accessor, O(1)
//! reader.rewind(audio_window_len)  // one second of history
//! extractor.extract(reader, engine.input_buffer())
//! drop(reader)                     // accessor never outlives the cycle
//! p = engine.predict()
//! stats EMA update → periodic latency log
//! gate.observe(p) → detection boolean
//! ```
//!
//! The extractor and engine live inside `Option<ActiveDetector>`: they exist
//! only between `enter` and `exit`, and `exit` drops them on every path.

use std::time::Instant;

use tracing::{debug, info};

use crate::buffering::SampleRing;
use crate::detect::{CycleStats, DetectConfig, DetectorState, HysteresisGate};
use crate::error::{Result, VigilError};
use crate::features::{FeatureExtractor, SpectrogramExtractor};
use crate::inference::{WakeClassifier, WakeEngine};

/// Builds a fresh classifier backend at each state entry.
pub type ClassifierFactory = Box<dyn FnMut() -> Result<Box<dyn WakeClassifier>> + Send>;

/// Free-memory query, read once at state exit for diagnostics.
pub type MemoryProbe = Box<dyn Fn() -> u64 + Send>;

/// Resources that exist only while the state is active.
struct ActiveDetector {
    extractor: SpectrogramExtractor,
    engine: WakeEngine,
}

pub struct WakeDetectState {
    config: DetectConfig,
    ring: SampleRing,
    make_classifier: ClassifierFactory,
    mem_probe: Option<MemoryProbe>,
    active: Option<ActiveDetector>,
    stats: CycleStats,
    gate: HysteresisGate,
}

impl WakeDetectState {
    /// A new, inactive state over `ring`. Call
    /// [`enter`](DetectorState::enter) before running cycles.
    pub fn new(config: DetectConfig, ring: SampleRing, make_classifier: ClassifierFactory) -> Self {
        let stats = CycleStats::new(config.ema_alpha, config.latency_log_interval);
        let gate = HysteresisGate::new(config.detection_threshold, config.required_exceedances);
        Self {
            config,
            ring,
            make_classifier,
            mem_probe: None,
            active: None,
            stats,
            gate,
        }
    }

    /// Install a free-memory probe, queried once at state exit.
    pub fn with_memory_probe(mut self, probe: MemoryProbe) -> Self {
        self.mem_probe = Some(probe);
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Smoothed cycle latency in milliseconds.
    pub fn average_cycle_ms(&self) -> f64 {
        self.stats.average_ms()
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }
}

impl DetectorState for WakeDetectState {
    fn enter(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Err(VigilError::AlreadyActive);
        }
        self.config.validate()?;

        let extractor = SpectrogramExtractor::new(
            self.config.audio_window_len,
            self.config.window_size,
            self.config.hop_size,
            self.config.pooling,
        )?;
        let engine = WakeEngine::new(extractor.shape().len(), (self.make_classifier)()?)?;
        info!(
            frames = extractor.shape().frames,
            bins = extractor.shape().bins,
            "wake detector entered"
        );

        self.stats.reset();
        self.gate.reset();
        self.active = Some(ActiveDetector { extractor, engine });
        Ok(())
    }

    fn run(&mut self) -> Result<bool> {
        let active = self.active.as_mut().ok_or(VigilError::NotActive)?;
        let started = Instant::now();

        let mut reader = self.ring.reader();
        let rewound = reader.rewind(self.config.audio_window_len);
        if rewound < self.config.audio_window_len {
            debug!(
                rewound,
                requested = self.config.audio_window_len,
                "short history — window head is silence"
            );
        }
        active
            .extractor
            .extract(&mut reader, active.engine.input_buffer())?;
        drop(reader);

        let probability = active.engine.predict()?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;
        if let Some(average_ms) = self.stats.record(elapsed_ms) {
            info!(
                average_ms = format_args!("{average_ms:.1}"),
                "average detection time"
            );
        }
        debug!(
            probability = format_args!("{probability:.4}"),
            "classifier output"
        );

        let detected = self.gate.observe(probability);
        if detected {
            info!(
                probability = format_args!("{probability:.2}"),
                "wake phrase detected"
            );
        }
        Ok(detected)
    }

    fn exit(&mut self) -> Result<()> {
        if self.active.take().is_none() {
            return Err(VigilError::NotActive);
        }
        // ActiveDetector dropped above; its buffers are gone before the probe
        // reads free memory.
        if let Some(probe) = &self.mem_probe {
            info!(free_bytes = probe(), "free memory after wake detector cleanup");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn test_config() -> DetectConfig {
        DetectConfig {
            audio_window_len: 512,
            ..DetectConfig::default()
        }
    }

    struct Scripted {
        outputs: Vec<f32>,
        next: usize,
    }

    impl WakeClassifier for Scripted {
        fn warm_up(&mut self) -> Result<()> {
            Ok(())
        }

        fn infer(&mut self, _features: &[f32]) -> Result<f32> {
            let p = self.outputs[self.next.min(self.outputs.len() - 1)];
            self.next += 1;
            Ok(p)
        }
    }

    fn scripted_factory(outputs: Vec<f32>) -> ClassifierFactory {
        Box::new(move || {
            Ok(Box::new(Scripted {
                outputs: outputs.clone(),
                next: 0,
            }) as Box<dyn WakeClassifier>)
        })
    }

    fn filled_ring(cfg: &DetectConfig) -> SampleRing {
        let ring = SampleRing::with_capacity(cfg.audio_window_len * 2);
        ring.writer().push_slice(&vec![0.1; cfg.audio_window_len]);
        ring
    }

    #[test]
    fn run_before_enter_is_rejected() {
        let cfg = test_config();
        let mut state =
            WakeDetectState::new(cfg.clone(), filled_ring(&cfg), scripted_factory(vec![0.0]));
        assert!(matches!(state.run(), Err(VigilError::NotActive)));
    }

    #[test]
    fn double_enter_is_rejected() {
        let cfg = test_config();
        let mut state =
            WakeDetectState::new(cfg.clone(), filled_ring(&cfg), scripted_factory(vec![0.0]));
        state.enter().unwrap();
        assert!(matches!(state.enter(), Err(VigilError::AlreadyActive)));
    }

    #[test]
    fn exit_without_enter_is_rejected() {
        let cfg = test_config();
        let mut state =
            WakeDetectState::new(cfg.clone(), filled_ring(&cfg), scripted_factory(vec![0.0]));
        assert!(matches!(state.exit(), Err(VigilError::NotActive)));
    }

    #[test]
    fn run_after_exit_is_rejected() {
        let cfg = test_config();
        let mut state =
            WakeDetectState::new(cfg.clone(), filled_ring(&cfg), scripted_factory(vec![0.0]));
        state.enter().unwrap();
        state.run().unwrap();
        state.exit().unwrap();
        assert!(matches!(state.run(), Err(VigilError::NotActive)));
    }

    #[test]
    fn consecutive_exceedances_detect_on_the_second() {
        let cfg = test_config();
        let mut state = WakeDetectState::new(
            cfg.clone(),
            filled_ring(&cfg),
            scripted_factory(vec![0.2, 0.96, 0.97, 0.3]),
        );
        state.enter().unwrap();

        let detections: Vec<bool> = (0..4).map(|_| state.run().unwrap()).collect();
        assert_eq!(detections, vec![false, false, true, false]);
    }

    #[test]
    fn exceedances_accumulate_across_misses() {
        // Sticky counter: the sub-threshold cycle does not clear it.
        let cfg = test_config();
        let mut state = WakeDetectState::new(
            cfg.clone(),
            filled_ring(&cfg),
            scripted_factory(vec![0.96, 0.10, 0.96, 0.96]),
        );
        state.enter().unwrap();

        let detections: Vec<bool> = (0..4).map(|_| state.run().unwrap()).collect();
        assert_eq!(detections, vec![false, false, false, true]);
    }

    #[test]
    fn reentry_resets_exceedances_and_latency() {
        let cfg = test_config();
        let mut state = WakeDetectState::new(
            cfg.clone(),
            filled_ring(&cfg),
            scripted_factory(vec![0.99]),
        );

        state.enter().unwrap();
        assert!(!state.run().unwrap());
        assert!(state.average_cycle_ms() > 0.0);
        state.exit().unwrap();

        state.enter().unwrap();
        assert_eq!(state.average_cycle_ms(), 0.0);
        // The carried-over exceedance is gone: a single exceedance does not
        // fire, the second one does.
        assert!(!state.run().unwrap());
        assert!(state.run().unwrap());
    }

    #[test]
    fn classifier_construction_failure_aborts_entry() {
        let cfg = test_config();
        let mut state = WakeDetectState::new(
            cfg.clone(),
            filled_ring(&cfg),
            Box::new(|| Err(VigilError::Inference("no model".into()))),
        );
        assert!(state.enter().is_err());
        assert!(!state.is_active());
        assert!(matches!(state.run(), Err(VigilError::NotActive)));
    }

    #[test]
    fn invalid_config_aborts_entry() {
        let cfg = DetectConfig {
            audio_window_len: 512,
            required_exceedances: 0,
            ..DetectConfig::default()
        };
        let ring = SampleRing::with_capacity(1024);
        let mut state = WakeDetectState::new(cfg, ring, scripted_factory(vec![0.0]));
        assert!(matches!(state.enter(), Err(VigilError::InvalidConfig(_))));
        assert!(!state.is_active());
    }

    #[test]
    fn exit_queries_the_memory_probe_once() {
        let probed = Arc::new(AtomicU32::new(0));
        let probed_in_probe = Arc::clone(&probed);

        let cfg = test_config();
        let mut state =
            WakeDetectState::new(cfg.clone(), filled_ring(&cfg), scripted_factory(vec![0.0]))
                .with_memory_probe(Box::new(move || {
                    probed_in_probe.fetch_add(1, Ordering::Relaxed);
                    64 * 1024
                }));

        state.enter().unwrap();
        state.run().unwrap();
        assert_eq!(probed.load(Ordering::Relaxed), 0);
        state.exit().unwrap();
        assert_eq!(probed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn runs_on_an_empty_ring_by_zero_padding() {
        // Nothing captured yet: the cycle still completes on a silent window.
        let cfg = test_config();
        let ring = SampleRing::with_capacity(cfg.audio_window_len);
        let mut state = WakeDetectState::new(cfg, ring, scripted_factory(vec![0.3]));
        state.enter().unwrap();
        assert!(!state.run().unwrap());
    }
}
