//! # Fast Fourier Transform (FFT) Module
//!
//! FFT-backed cross-correlation used by the time-domain pitch estimator.
//! Computing the lag products in the frequency domain turns the
//! O(N²) difference function into O(N log N), which keeps a 4096-sample
//! frame comfortably inside a 60 Hz tick.
//!
//! ## Features
//! - Forward/inverse plans built once per frame size using RustFFT
//! - Linear (non-circular) correlation for the lags the estimator needs
//! - f64 accumulation so near-zero dips are not swamped by rounding noise

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Cross-correlates a leading window of a frame against the whole frame.
pub struct Correlator {
    frame_size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    window_spectrum: Vec<Complex<f64>>,
    frame_spectrum: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl Correlator {
    /// Plans transforms for frames of exactly `frame_size` samples.
    pub fn new(frame_size: usize) -> Self {
        // With window + lag <= frame_size no product wraps around, so the
        // frame length rounded up to a power of two is enough.
        let fft_size = frame_size.max(1).next_power_of_two();
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            frame_size,
            forward,
            inverse,
            window_spectrum: vec![Complex::default(); fft_size],
            frame_spectrum: vec![Complex::default(); fft_size],
            scratch: vec![Complex::default(); scratch_len],
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Computes `c[tau] = sum_{i < window} frame[i] * frame[i + tau]`.
    ///
    /// # Arguments
    /// * `frame` - Input samples, exactly `frame_size` long
    /// * `window` - Number of leading samples correlated against the frame
    /// * `out` - Receives one value per lag; `window + out.len()` must not
    ///   exceed the frame length
    ///
    /// # Panics
    /// * If the frame length does not match the planned size, or the
    ///   requested lags would read past the end of the frame
    pub fn correlate(&mut self, frame: &[f32], window: usize, out: &mut [f64]) {
        assert_eq!(frame.len(), self.frame_size, "frame size changed after planning");
        assert!(window + out.len() <= frame.len(), "lag range exceeds frame");

        let fft_size = self.window_spectrum.len();
        for (i, slot) in self.frame_spectrum.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(f64::from(sample), 0.0);
        }
        for (i, slot) in self.window_spectrum.iter_mut().enumerate() {
            let sample = if i < window { frame[i] } else { 0.0 };
            *slot = Complex::new(f64::from(sample), 0.0);
        }

        self.forward
            .process_with_scratch(&mut self.frame_spectrum, &mut self.scratch);
        self.forward
            .process_with_scratch(&mut self.window_spectrum, &mut self.scratch);

        // conj(W) * X is the spectrum of the correlation.
        for (w, x) in self.window_spectrum.iter_mut().zip(&self.frame_spectrum) {
            *w = w.conj() * x;
        }
        self.inverse
            .process_with_scratch(&mut self.window_spectrum, &mut self.scratch);

        let scale = 1.0 / fft_size as f64;
        for (value, c) in out.iter_mut().zip(&self.window_spectrum) {
            *value = c.re * scale;
        }
    }
}
