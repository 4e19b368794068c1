// tuner-core/src/lib.rs

//! The core logic for the instrument tuner.
//! This crate is responsible for signal gating, pitch estimation, note
//! quantization against an adjustable reference pitch, and per-instrument
//! string tables. It is completely headless and contains no display code.

pub mod audio;
pub mod classify;
pub mod error;
pub mod fft;
pub mod instrument;
pub mod level;
pub mod pitch;
pub mod session;
pub mod settings;
pub mod tone;
pub mod tuning;

pub use audio::{AudioFrame, CpalFrameSource, FrameSource};
pub use classify::{Classification, TuneState, classify};
pub use error::{Result, TunerError};
pub use instrument::{Instrument, InstrumentProfile, ScaledTuning, build_scaled_tuning};
pub use level::{GateReading, NoiseGate};
pub use pitch::{EstimatorFactory, PitchEstimator, YinEstimator, YinFactory};
pub use session::{
    AnalysisResult, CycleReport, SessionState, TunerSession, TuningReading, analyze_frame,
    read_frequency,
};
pub use settings::{Settings, SettingsStore};
pub use tone::{CpalTonePlayer, TonePlayer};
pub use tuning::{Note, NoteLabel, PitchClass, ReferencePitch, cents_off, map_to_note};
