//! # Noise Gate Module
//!
//! Decides whether a frame carries enough energy to be worth analysing, and
//! derives the input-level percentage a meter can show for the same frame.
//!
//! ## Features
//! - RMS energy and dBFS conversion
//! - Signal/silence decision at a fixed RMS threshold (≈ -40 dBFS)
//! - Linear meter mapping of [-60, 0] dBFS onto [0, 100] %

/// Default RMS threshold above which a frame counts as "has signal".
pub const GATE_THRESHOLD_RMS: f32 = 0.01;

/// Lowest level shown by the meter, in dBFS. Anything quieter reads as 0 %.
pub const METER_FLOOR_DB: f32 = -60.0;

/// Energy measurement for a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateReading {
    /// Root-mean-square amplitude of the frame.
    pub rms: f32,
    /// RMS in dBFS. Negative infinity for a silent frame.
    pub db: f32,
    /// Meter level in percent, clamped to [0, 100].
    pub level_percent: f32,
    /// Whether the gate is open for this frame.
    pub has_signal: bool,
}

impl GateReading {
    /// Reading for digital silence: closed gate, empty meter.
    pub const SILENT: GateReading = GateReading {
        rms: 0.0,
        db: f32::NEG_INFINITY,
        level_percent: 0.0,
        has_signal: false,
    };
}

/// RMS-threshold signal detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseGate {
    threshold: f32,
}

impl Default for NoiseGate {
    fn default() -> Self {
        Self {
            threshold: GATE_THRESHOLD_RMS,
        }
    }
}

impl NoiseGate {
    /// Creates a gate with a custom RMS threshold.
    ///
    /// Negative or non-finite thresholds fall back to [`GATE_THRESHOLD_RMS`].
    pub fn new(threshold: f32) -> Self {
        if threshold.is_finite() && threshold >= 0.0 {
            Self { threshold }
        } else {
            log::warn!("[GATE] Ignoring invalid threshold {threshold}, using default");
            Self::default()
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Measures a frame and applies the gate.
    ///
    /// # Arguments
    /// * `samples` - Frame samples, nominally in [-1, 1]
    ///
    /// # Returns
    /// * `GateReading` - RMS, dBFS, meter level and the gate decision
    pub fn measure(&self, samples: &[f32]) -> GateReading {
        let rms = rms(samples);
        let db = rms_to_db(rms);
        GateReading {
            rms,
            db,
            level_percent: level_percent(db),
            has_signal: rms > self.threshold,
        }
    }

    /// Shorthand for `measure(samples).has_signal`.
    pub fn has_signal(&self, samples: &[f32]) -> bool {
        self.measure(samples).has_signal
    }
}

/// Root-mean-square amplitude. An empty frame has zero energy.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Converts an RMS amplitude to dBFS.
///
/// Zero (or anything that is not a positive number) maps to negative
/// infinity rather than NaN so downstream clamping stays well defined.
pub fn rms_to_db(rms: f32) -> f32 {
    if rms > 0.0 {
        20.0 * rms.log10()
    } else {
        f32::NEG_INFINITY
    }
}

/// Maps dBFS linearly from [-60, 0] to [0, 100] percent, clamped at both ends.
pub fn level_percent(db: f32) -> f32 {
    if db.is_nan() {
        return 0.0;
    }
    ((db - METER_FLOOR_DB) / -METER_FLOOR_DB * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn all_zero_frame_is_silent() {
        let reading = NoiseGate::default().measure(&[0.0; 4096]);
        assert!(!reading.has_signal);
        assert_eq!(reading.rms, 0.0);
        assert_eq!(reading.level_percent, 0.0);
        assert!(reading.db.is_infinite() && reading.db < 0.0);
    }

    #[test]
    fn empty_frame_is_silent() {
        assert_eq!(NoiseGate::default().measure(&[]), GateReading::SILENT);
    }

    #[test]
    fn full_scale_sine_opens_gate_near_full_meter() {
        let frame = sine(440.0, 44_100.0, 4096, 1.0);
        let reading = NoiseGate::default().measure(&frame);
        assert!(reading.has_signal);
        assert_relative_eq!(reading.rms, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-3);
        assert!(reading.level_percent > 90.0, "level {}", reading.level_percent);
    }

    #[test]
    fn gate_opens_above_threshold() {
        // A constant frame has RMS equal to its absolute value.
        let gate = NoiseGate::default();
        assert!(!gate.has_signal(&[0.009; 64]));
        assert!(gate.has_signal(&[0.011; 64]));
        assert!(!gate.has_signal(&[-0.005; 64]));
    }

    #[test]
    fn meter_maps_db_range_linearly() {
        assert_eq!(level_percent(-60.0), 0.0);
        assert_eq!(level_percent(-90.0), 0.0);
        assert_relative_eq!(level_percent(-30.0), 50.0, epsilon = 1e-4);
        assert_eq!(level_percent(0.0), 100.0);
        assert_eq!(level_percent(6.0), 100.0);
        assert_eq!(level_percent(f32::NAN), 0.0);
    }

    #[test]
    fn invalid_threshold_falls_back_to_default() {
        assert_eq!(NoiseGate::new(-1.0).threshold(), GATE_THRESHOLD_RMS);
        assert_eq!(NoiseGate::new(f32::NAN).threshold(), GATE_THRESHOLD_RMS);
        assert_eq!(NoiseGate::new(0.05).threshold(), 0.05);
    }
}
