//! # Settings Module
//!
//! The two session-wide user settings (reference pitch and selected
//! instrument) and the contract for persisting them. Where they are stored
//! is up to the application; the core only validates values at the boundary
//! so nothing out of range ever reaches the note math.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, TunerError};
use crate::instrument::Instrument;
use crate::tuning::ReferencePitch;

pub const DEFAULT_REFERENCE_HZ: u32 = 440;

/// Lowest reference pitch accepted from the user.
pub const MIN_REFERENCE_HZ: u32 = 400;

/// Highest reference pitch accepted from the user.
pub const MAX_REFERENCE_HZ: u32 = 480;

/// Persisted user settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// A4 in whole Hz.
    #[serde(rename = "tuner-a4")]
    pub reference_hz: u32,
    #[serde(rename = "tuner-instrument", deserialize_with = "lenient_instrument")]
    pub instrument: Instrument,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reference_hz: DEFAULT_REFERENCE_HZ,
            instrument: Instrument::default(),
        }
    }
}

impl Settings {
    /// Checks a user-entered reference pitch against the supported range.
    pub fn validate_reference(hz: u32) -> Result<u32> {
        if (MIN_REFERENCE_HZ..=MAX_REFERENCE_HZ).contains(&hz) {
            Ok(hz)
        } else {
            Err(TunerError::ReferencePitchOutOfRange(hz))
        }
    }

    /// Pulls an out-of-range reference back into the supported range.
    ///
    /// Used on values read back from storage, which may have been written
    /// by something other than this crate.
    pub fn sanitized(self) -> Self {
        let clamped = self.reference_hz.clamp(MIN_REFERENCE_HZ, MAX_REFERENCE_HZ);
        if clamped != self.reference_hz {
            log::warn!(
                "[SETTINGS] Stored reference pitch {} Hz out of range, using {} Hz",
                self.reference_hz,
                clamped
            );
        }
        Self {
            reference_hz: clamped,
            ..self
        }
    }

    pub fn reference_pitch(&self) -> ReferencePitch {
        ReferencePitch::new(self.reference_hz as f32).unwrap_or_default()
    }
}

fn lenient_instrument<'de, D>(deserializer: D) -> std::result::Result<Instrument, D::Error>
where
    D: Deserializer<'de>,
{
    let key = String::deserialize(deserializer)?;
    Ok(key.parse().unwrap_or_else(|e| {
        log::warn!("[SETTINGS] {e}, falling back to {}", Instrument::default());
        Instrument::default()
    }))
}

/// Where settings live between runs.
pub trait SettingsStore {
    fn load(&self) -> Result<Settings>;
    fn save(&mut self, settings: &Settings) -> Result<()>;
}

/// Loads settings, falling back to defaults if the store cannot be read,
/// and clamping anything out of range.
pub fn load_or_default(store: &dyn SettingsStore) -> Settings {
    match store.load() {
        Ok(settings) => {
            log::info!("[SETTINGS] Loaded settings: {settings:?}");
            settings.sanitized()
        }
        Err(e) => {
            log::warn!("[SETTINGS] {e}. Using defaults.");
            Settings::default()
        }
    }
}

/// Store that keeps settings in memory, for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Option<Settings>,
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Settings> {
        self.saved
            .ok_or_else(|| TunerError::Store("nothing saved yet".into()))
    }

    fn save(&mut self, settings: &Settings) -> Result<()> {
        self.saved = Some(*settings);
        Ok(())
    }
}
