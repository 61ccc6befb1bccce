//! Per-cycle statistics: latency EMA and the detection hysteresis gate.
//!
//! Both persist across cycles for the lifetime of an active state and are
//! reset on (re-)entry.

/// Exponential moving average of cycle latency plus periodic reporting.
#[derive(Debug, Clone)]
pub struct CycleStats {
    ema_alpha: f64,
    average_ms: f64,
    runs_since_report: u64,
    report_interval: u64,
}

impl CycleStats {
    pub fn new(ema_alpha: f64, report_interval: u64) -> Self {
        Self {
            ema_alpha,
            average_ms: 0.0,
            runs_since_report: 0,
            report_interval,
        }
    }

    /// Fold one cycle's elapsed time into the average:
    /// `avg = α·elapsed + (1−α)·avg`, starting from 0.
    ///
    /// Returns `Some(average)` on every `report_interval`-th call — the
    /// caller logs it — wrapping the run counter back to 0 as the reference
    /// does.
    pub fn record(&mut self, elapsed_ms: f64) -> Option<f64> {
        self.average_ms = self.ema_alpha * elapsed_ms + (1.0 - self.ema_alpha) * self.average_ms;
        self.runs_since_report += 1;
        if self.runs_since_report == self.report_interval {
            self.runs_since_report = 0;
            Some(self.average_ms)
        } else {
            None
        }
    }

    pub fn average_ms(&self) -> f64 {
        self.average_ms
    }

    pub fn reset(&mut self) {
        self.average_ms = 0.0;
        self.runs_since_report = 0;
    }
}

/// Debounce over a noisy per-cycle probability stream.
///
/// Each cycle with `probability > threshold` increments the exceedance
/// count; reaching `required` fires a one-shot detection and zeroes the
/// count. A below-threshold cycle leaves the count untouched — exceedances
/// accumulate even across misses, exactly as the reference behaves. (True
/// hysteresis would decay on a miss; the sticky variant is preserved
/// deliberately and pinned down by tests.)
#[derive(Debug, Clone)]
pub struct HysteresisGate {
    threshold: f32,
    required: u32,
    exceedances: u32,
}

impl HysteresisGate {
    pub fn new(threshold: f32, required: u32) -> Self {
        Self {
            threshold,
            required,
            exceedances: 0,
        }
    }

    /// Feed one cycle's probability; returns `true` on the cycle the
    /// detection fires.
    pub fn observe(&mut self, probability: f32) -> bool {
        if probability > self.threshold {
            self.exceedances += 1;
            if self.exceedances >= self.required {
                self.exceedances = 0;
                return true;
            }
        }
        false
    }

    /// Current accumulated exceedance count.
    pub fn exceedances(&self) -> u32 {
        self.exceedances
    }

    pub fn reset(&mut self) {
        self.exceedances = 0;
    }
}
