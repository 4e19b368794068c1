//! # Analysis Session Module
//!
//! Owns the session-wide settings and drives the per-frame analysis cycle.
//!
//! ## Architecture
//! - **Idle**: no frame source, no estimator
//! - **Running**: a frame source and an estimator bound to its sample rate
//! - **Cycle**: an external driver calls [`TunerSession::run_cycle`] at its
//!   own cadence (timer, display refresh, or a test calling it directly);
//!   every call handles at most one frame and yields at most one result
//!
//! Settings are changed through `&mut self`, so a change always lands between
//! two cycles and applies from the next one.

use crate::audio::FrameSource;
use crate::classify::{Classification, classify};
use crate::error::{Result, TunerError};
use crate::instrument::{Instrument, ScaledTuning, build_scaled_tuning};
use crate::level::{GateReading, NoiseGate};
use crate::pitch::{EstimatorFactory, PitchEstimator, is_admissible};
use crate::settings::Settings;
use crate::tuning::{Note, ReferencePitch, cents_off, map_to_note};

/// Whether the session is analysing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// A full tuning readout for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningReading {
    /// Detected fundamental in Hz.
    pub frequency: f32,
    /// Nearest note under the current reference pitch.
    pub note: Note,
    /// Deviation from that note, in whole cents.
    pub cents: i32,
    pub classification: Classification,
}

/// Something a display should act on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnalysisResult {
    /// The gate rejected the frame; reset the readout to neutral.
    NoSignal,
    /// A valid pitch was found.
    Tuning(TuningReading),
}

/// Everything one cycle produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// Level of the analysed frame, for meters.
    pub level: GateReading,
    /// `None` when the gate was open but no admissible pitch was found; the
    /// display keeps its previous readout.
    pub result: Option<AnalysisResult>,
}

/// Maps a detected frequency to a complete readout.
///
/// # Returns
/// * `Some(reading)` - for a positive, finite frequency
/// * `None` - otherwise
pub fn read_frequency(frequency: f32, reference: ReferencePitch) -> Option<TuningReading> {
    let note = map_to_note(frequency, reference)?;
    let cents = cents_off(frequency, &note, reference);
    Some(TuningReading {
        frequency,
        note,
        cents,
        classification: classify(cents),
    })
}

/// Runs one frame through gate, estimator, note mapper and classifier.
///
/// This is the whole cycle minus frame acquisition, usable without a
/// session.
pub fn analyze_frame(
    frame: &[f32],
    gate: &NoiseGate,
    estimator: &mut dyn PitchEstimator,
    reference: ReferencePitch,
) -> CycleReport {
    let level = gate.measure(frame);
    if !level.has_signal {
        return CycleReport {
            level,
            result: Some(AnalysisResult::NoSignal),
        };
    }

    let result = match estimator.estimate(frame) {
        Some(freq) if is_admissible(freq) => {
            read_frequency(freq, reference).map(AnalysisResult::Tuning)
        }
        Some(freq) => {
            log::trace!("[SESSION] Discarding implausible estimate {freq} Hz");
            None
        }
        None => None,
    };

    CycleReport { level, result }
}

struct RunningAnalysis {
    source: Box<dyn FrameSource>,
    estimator: Box<dyn PitchEstimator>,
    sample_rate: u32,
    cycles: u64,
}

/// Session context: settings, the derived string table, and the cycle.
pub struct TunerSession {
    settings: Settings,
    reference: ReferencePitch,
    tuning: ScaledTuning,
    gate: NoiseGate,
    running: Option<RunningAnalysis>,
}

impl Default for TunerSession {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl TunerSession {
    /// Creates an idle session. Out-of-range settings are clamped.
    pub fn new(settings: Settings) -> Self {
        let settings = settings.sanitized();
        let reference = settings.reference_pitch();
        Self {
            tuning: build_scaled_tuning(&settings.instrument.profile(), reference),
            settings,
            reference,
            gate: NoiseGate::default(),
            running: None,
        }
    }

    pub fn with_gate(mut self, gate: NoiseGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn reference_pitch(&self) -> ReferencePitch {
        self.reference
    }

    /// Changes the reference pitch and rebuilds the string table.
    ///
    /// # Returns
    /// * `Err(TunerError::ReferencePitchOutOfRange)` - value rejected, nothing changed
    pub fn set_reference_pitch(&mut self, hz: u32) -> Result<()> {
        let hz = Settings::validate_reference(hz)?;
        self.settings.reference_hz = hz;
        self.reference = self.settings.reference_pitch();
        self.rebuild_tuning();
        log::info!("[SESSION] Reference pitch set to {hz} Hz");
        Ok(())
    }

    pub fn instrument(&self) -> Instrument {
        self.settings.instrument
    }

    /// Changes the instrument and rebuilds the string table.
    pub fn set_instrument(&mut self, instrument: Instrument) {
        self.settings.instrument = instrument;
        self.rebuild_tuning();
        log::info!("[SESSION] Instrument set to {instrument}");
    }

    /// Like [`set_instrument`](Self::set_instrument), from a persistence key.
    pub fn select_instrument(&mut self, key: &str) -> Result<()> {
        self.set_instrument(key.parse()?);
        Ok(())
    }

    /// The selected instrument's strings at the current reference pitch.
    pub fn scaled_tuning(&self) -> &ScaledTuning {
        &self.tuning
    }

    fn rebuild_tuning(&mut self) {
        self.tuning = build_scaled_tuning(&self.settings.instrument.profile(), self.reference);
    }

    pub fn state(&self) -> SessionState {
        if self.running.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Sample rate of the running session.
    pub fn sample_rate(&self) -> Option<u32> {
        self.running.as_ref().map(|r| r.sample_rate)
    }

    /// Opens a frame source, builds an estimator for its sample rate and
    /// moves to `Running`.
    ///
    /// # Arguments
    /// * `open` - Acquires the frame source (e.g. opens the microphone)
    /// * `factory` - Builds the pitch estimator
    ///
    /// # Returns
    /// * `Ok(())` - The session is running
    /// * `Err(_)` - Already running, acquisition failed, or the estimator
    ///   could not be built; the session stays as it was
    pub fn start<S, F>(&mut self, open: F, factory: &dyn EstimatorFactory) -> Result<()>
    where
        S: FrameSource + 'static,
        F: FnOnce() -> Result<S>,
    {
        if self.running.is_some() {
            return Err(TunerError::AlreadyRunning);
        }

        let source = open().inspect_err(|e| log::error!("[SESSION] Could not start: {e}"))?;
        let sample_rate = source.sample_rate();
        if sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate(sample_rate));
        }
        let estimator = factory.create(sample_rate)?;

        self.running = Some(RunningAnalysis {
            source: Box::new(source),
            estimator,
            sample_rate,
            cycles: 0,
        });
        log::info!(
            "[SESSION] Analysis started at {sample_rate} Hz, A4 = {} Hz, {}",
            self.settings.reference_hz,
            self.settings.instrument
        );
        Ok(())
    }

    /// Returns to `Idle`, releasing the frame source and the estimator.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            log::info!("[SESSION] Analysis stopped after {} cycles", running.cycles);
        }
    }

    /// Runs one analysis cycle.
    ///
    /// # Returns
    /// * `None` - The session is idle, or no new frame was ready
    /// * `Some(report)` - The frame's level and, if any, its result
    pub fn run_cycle(&mut self) -> Option<CycleReport> {
        let running = self.running.as_mut()?;
        let frame = running.source.next_frame()?;
        running.cycles += 1;

        let report = analyze_frame(&frame, &self.gate, running.estimator.as_mut(), self.reference);
        if let Some(AnalysisResult::Tuning(reading)) = &report.result {
            log::debug!(
                "[SESSION] {:.2} Hz -> {} {:+} cents ({:?})",
                reading.frequency,
                reading.note,
                reading.cents,
                reading.classification.state
            );
        }
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::TuneState;
    use crate::tuning::PitchClass;

    struct Fixed(Option<f32>);

    impl PitchEstimator for Fixed {
        fn estimate(&mut self, _frame: &[f32]) -> Option<f32> {
            self.0
        }
    }

    #[test]
    fn read_frequency_builds_full_reading() {
        let reading = read_frequency(110.0, ReferencePitch::STANDARD).unwrap();
        assert_eq!(reading.note.pitch_class, PitchClass::A);
        assert_eq!(reading.note.octave, 2);
        assert_eq!(reading.cents, 0);
        assert_eq!(reading.classification.state, TuneState::InTune);
    }

    #[test]
    fn quiet_frame_is_no_signal_even_with_a_pitch() {
        let mut estimator = Fixed(Some(440.0));
        let report = analyze_frame(
            &[0.0; 512],
            &NoiseGate::default(),
            &mut estimator,
            ReferencePitch::STANDARD,
        );
        assert_eq!(report.result, Some(AnalysisResult::NoSignal));
        assert_eq!(report.level.level_percent, 0.0);
    }

    #[test]
    fn out_of_band_estimates_are_dropped() {
        for freq in [10.0, 6000.0] {
            let mut estimator = Fixed(Some(freq));
            let report = analyze_frame(
                &[0.5; 512],
                &NoiseGate::default(),
                &mut estimator,
                ReferencePitch::STANDARD,
            );
            assert!(report.level.has_signal);
            assert_eq!(report.result, None, "{freq} Hz should be discarded");
        }
    }

    #[test]
    fn no_detection_keeps_previous_readout() {
        let mut estimator = Fixed(None);
        let report = analyze_frame(
            &[0.5; 512],
            &NoiseGate::default(),
            &mut estimator,
            ReferencePitch::STANDARD,
        );
        assert_eq!(report.result, None);
    }

    #[test]
    fn sharp_reading_is_classified() {
        let mut estimator = Fixed(Some(445.0));
        let report = analyze_frame(
            &[0.5; 512],
            &NoiseGate::default(),
            &mut estimator,
            ReferencePitch::STANDARD,
        );
        let Some(AnalysisResult::Tuning(reading)) = report.result else {
            panic!("expected a tuning result, got {:?}", report.result);
        };
        assert_eq!(reading.note.to_string(), "A4");
        assert_eq!(reading.cents, 20);
        assert_eq!(reading.classification.state, TuneState::Sharp);
    }

    #[test]
    fn setters_rebuild_the_string_table() {
        let mut session = TunerSession::default();
        assert_eq!(session.scaled_tuning().strings[1].frequency, 110.0);

        session.set_reference_pitch(442).unwrap();
        assert_eq!(session.scaled_tuning().reference_hz, 442.0);
        assert!(session.scaled_tuning().strings[1].frequency > 110.0);

        session.set_instrument(Instrument::Chromatic);
        assert!(session.scaled_tuning().is_empty());

        session.select_instrument("bass").unwrap();
        assert_eq!(session.scaled_tuning().strings.len(), 4);
    }

    #[test]
    fn rejected_settings_leave_state_untouched() {
        let mut session = TunerSession::default();
        assert!(session.set_reference_pitch(0).is_err());
        assert!(session.set_reference_pitch(500).is_err());
        assert_eq!(session.reference_pitch(), ReferencePitch::STANDARD);

        assert!(session.select_instrument("kazoo").is_err());
        assert_eq!(session.instrument(), Instrument::Guitar);
    }

    #[test]
    fn idle_session_produces_nothing() {
        let mut session = TunerSession::default();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.run_cycle(), None);
    }
}
