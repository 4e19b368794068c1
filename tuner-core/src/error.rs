//! Error type shared by every fallible operation in the core.
//!
//! The taxonomy is intentionally narrow: a pitch that could not be detected
//! is a normal per-frame outcome and never shows up here.

use thiserror::Error;

/// Failures surfaced by the tuner core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TunerError {
    /// The frame source could not be opened (no device, permission denied, ...).
    #[error("audio acquisition failed: {0}")]
    Acquisition(String),

    /// `start` was called on a session that is already running.
    #[error("analysis session is already running")]
    AlreadyRunning,

    /// Reference pitch is not a positive, finite frequency.
    #[error("invalid reference pitch: {0} Hz")]
    InvalidReferencePitch(f32),

    /// Reference pitch setting lies outside the safe range.
    #[error("reference pitch {0} Hz is outside the supported range")]
    ReferencePitchOutOfRange(u32),

    #[error("unknown instrument: {0:?}")]
    UnknownInstrument(String),

    #[error("invalid note name: {0:?}")]
    InvalidNoteName(String),

    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// The reference tone could not be played.
    #[error("tone playback failed: {0}")]
    Tone(String),

    /// The settings store could not be read or written.
    #[error("settings store error: {0}")]
    Store(String),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, TunerError>;
