//! # Pitch Detection Module
//!
//! The fundamental-frequency estimator is a pluggable capability: the
//! analysis cycle only talks to [`PitchEstimator`] values produced by an
//! [`EstimatorFactory`] bound to the session's sample rate. This module
//! defines that contract, the plausibility band applied to every estimate,
//! and a default YIN implementation.
//!
//! ## Features
//! - YIN difference function computed through FFT cross-correlation
//! - Cumulative mean normalisation and absolute-threshold dip search
//! - Walk to the bottom of the first dip to avoid octave errors
//! - Parabolic interpolation for sub-sample accuracy

use crate::error::{Result, TunerError};
use crate::fft::Correlator;

/// Lowest admissible fundamental, exclusive.
pub const MIN_FREQUENCY_HZ: f32 = 20.0;

/// Highest admissible fundamental, exclusive.
pub const MAX_FREQUENCY_HZ: f32 = 5000.0;

/// Default YIN absolute threshold.
pub const DEFAULT_YIN_THRESHOLD: f32 = 0.1;

/// Returns `true` if a detected frequency is plausible for tuning, i.e. lies
/// strictly between [`MIN_FREQUENCY_HZ`] and [`MAX_FREQUENCY_HZ`].
pub fn is_admissible(freq: f32) -> bool {
    freq > MIN_FREQUENCY_HZ && freq < MAX_FREQUENCY_HZ
}

/// Per-frame fundamental frequency estimation.
///
/// An instance is bound to one sample rate for its whole life. It may keep
/// internal scratch state, hence `&mut self`.
pub trait PitchEstimator {
    /// Returns the estimated fundamental in Hz, or `None` for noise,
    /// silence or anything the algorithm cannot lock onto.
    fn estimate(&mut self, frame: &[f32]) -> Option<f32>;
}

/// Builds estimators for a given sample rate.
pub trait EstimatorFactory {
    fn create(&self, sample_rate: u32) -> Result<Box<dyn PitchEstimator>>;
}

impl<F> EstimatorFactory for F
where
    F: Fn(u32) -> Result<Box<dyn PitchEstimator>>,
{
    fn create(&self, sample_rate: u32) -> Result<Box<dyn PitchEstimator>> {
        self(sample_rate)
    }
}

/// Factory for [`YinEstimator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YinFactory {
    pub threshold: f32,
}

impl Default for YinFactory {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_YIN_THRESHOLD,
        }
    }
}

impl EstimatorFactory for YinFactory {
    fn create(&self, sample_rate: u32) -> Result<Box<dyn PitchEstimator>> {
        Ok(Box::new(
            YinEstimator::new(sample_rate)?.with_threshold(self.threshold),
        ))
    }
}

/// A YIN pitch estimator.
///
/// Plans its FFTs lazily for the first frame length it sees and replans if
/// the length changes.
pub struct YinEstimator {
    sample_rate: u32,
    threshold: f32,
    correlator: Option<Correlator>,
    correlation: Vec<f64>,
    yin_buffer: Vec<f64>,
}

impl YinEstimator {
    /// # Returns
    /// * `Err(TunerError::InvalidSampleRate)` - for a zero sample rate
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            sample_rate,
            threshold: DEFAULT_YIN_THRESHOLD,
            correlator: None,
            correlation: Vec::new(),
            yin_buffer: Vec::new(),
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Fills `yin_buffer` with the cumulative mean normalised difference.
    fn normalized_difference(&mut self, signal: &[f32]) {
        let half = signal.len() / 2;

        if self
            .correlator
            .as_ref()
            .is_some_and(|c| c.frame_size() != signal.len())
        {
            log::debug!("[PITCH] Frame length changed to {}, replanning", signal.len());
            self.correlator = None;
        }
        let correlator = self
            .correlator
            .get_or_insert_with(|| Correlator::new(signal.len()));
        self.correlation.resize(half, 0.0);
        correlator.correlate(signal, half, &mut self.correlation);

        // Prefix sums of squared samples give every window energy in O(1).
        let mut energy = Vec::with_capacity(signal.len() + 1);
        energy.push(0.0f64);
        let mut acc = 0.0f64;
        for &s in signal {
            acc += f64::from(s) * f64::from(s);
            energy.push(acc);
        }
        let window_energy = |start: usize| energy[start + half] - energy[start];

        // --- Step 1 & 2: Difference function ---
        // d(tau) = sum (x[i] - x[i + tau])^2 = E(0) + E(tau) - 2 r(tau)
        self.yin_buffer.clear();
        self.yin_buffer.resize(half, 0.0);
        let e0 = window_energy(0);
        for tau in 1..half {
            let diff = e0 + window_energy(tau) - 2.0 * self.correlation[tau];
            self.yin_buffer[tau] = diff.max(0.0);
        }

        // --- Step 3: Cumulative mean normalized difference ---
        let mut running_sum = 0.0;
        self.yin_buffer[0] = 1.0;
        for tau in 1..half {
            running_sum += self.yin_buffer[tau];
            if running_sum > 0.0 {
                self.yin_buffer[tau] *= tau as f64 / running_sum;
            } else {
                self.yin_buffer[tau] = 1.0;
            }
        }
    }

    /// First lag whose dip falls below the threshold, walked down to the
    /// bottom of that dip.
    fn find_period(&self) -> Option<usize> {
        let half = self.yin_buffer.len();
        let threshold = f64::from(self.threshold);

        let mut tau = (2..half).find(|&tau| self.yin_buffer[tau] < threshold)?;
        while tau + 1 < half && self.yin_buffer[tau + 1] < self.yin_buffer[tau] {
            tau += 1;
        }
        Some(tau)
    }
}

impl PitchEstimator for YinEstimator {
    fn estimate(&mut self, signal: &[f32]) -> Option<f32> {
        // Need at least a couple of lags either side of any dip.
        if signal.len() < 8 {
            return None;
        }

        self.normalized_difference(signal);

        // --- Step 4 & 5: Absolute threshold ---
        let period = self.find_period()?;

        // --- Step 6: Parabolic interpolation for better precision ---
        // A dip on the last lag cannot be interpolated and is too close to
        // the window edge to trust.
        if period + 1 >= self.yin_buffer.len() {
            return None;
        }
        let y1 = self.yin_buffer[period - 1];
        let y2 = self.yin_buffer[period];
        let y3 = self.yin_buffer[period + 1];

        let curvature = y1 - 2.0 * y2 + y3;
        let period_float = if curvature != 0.0 {
            period as f64 + (y1 - y3) / (2.0 * curvature)
        } else {
            period as f64
        };

        let frequency = (f64::from(self.sample_rate) / period_float) as f32;
        if frequency.is_finite() && frequency > 0.0 {
            Some(frequency)
        } else {
            None
        }
    }
}
