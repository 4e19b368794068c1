//! # Instrument Module
//!
//! Canonical open-string tunings for the supported instruments, and the
//! builder that rescales them to the selected reference pitch.
//!
//! Canonical frequencies are written at A4 = 440 Hz. String labels are
//! nominal and never change with the reference; only frequencies scale.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};
use crate::tuning::{NoteLabel, PitchClass, ReferencePitch};

/// One open string of a canonical tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StringPitch {
    pub label: NoteLabel,
    /// Frequency in Hz at A4 = 440 Hz.
    pub frequency: f32,
}

const fn string(pitch_class: PitchClass, octave: i32, frequency: f32) -> StringPitch {
    StringPitch {
        label: NoteLabel::new(pitch_class, octave),
        frequency,
    }
}

/// A named, ordered list of open strings, low to high as played.
///
/// An empty list is valid and means "no fixed strings" (chromatic mode).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentProfile {
    pub name: &'static str,
    pub strings: &'static [StringPitch],
}

const GUITAR: [StringPitch; 6] = [
    string(PitchClass::E, 2, 82.41),
    string(PitchClass::A, 2, 110.00),
    string(PitchClass::D, 3, 146.83),
    string(PitchClass::G, 3, 196.00),
    string(PitchClass::B, 3, 246.94),
    string(PitchClass::E, 4, 329.63),
];

const BASS: [StringPitch; 4] = [
    string(PitchClass::E, 1, 41.20),
    string(PitchClass::A, 1, 55.00),
    string(PitchClass::D, 2, 73.42),
    string(PitchClass::G, 2, 98.00),
];

// Re-entrant: the G string sits above C and E.
const UKULELE: [StringPitch; 4] = [
    string(PitchClass::G, 4, 392.00),
    string(PitchClass::C, 4, 261.63),
    string(PitchClass::E, 4, 329.63),
    string(PitchClass::A, 4, 440.00),
];

const VIOLIN: [StringPitch; 4] = [
    string(PitchClass::G, 3, 196.00),
    string(PitchClass::D, 4, 293.66),
    string(PitchClass::A, 4, 440.00),
    string(PitchClass::E, 5, 659.25),
];

/// The fixed set of selectable instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    #[default]
    Guitar,
    Bass,
    Ukulele,
    Violin,
    Chromatic,
}

impl Instrument {
    pub const ALL: [Instrument; 5] = [
        Instrument::Guitar,
        Instrument::Bass,
        Instrument::Ukulele,
        Instrument::Violin,
        Instrument::Chromatic,
    ];

    /// Persistence key, e.g. `"guitar"`.
    pub fn key(self) -> &'static str {
        match self {
            Instrument::Guitar => "guitar",
            Instrument::Bass => "bass",
            Instrument::Ukulele => "ukulele",
            Instrument::Violin => "violin",
            Instrument::Chromatic => "chromatic",
        }
    }

    pub fn profile(self) -> InstrumentProfile {
        let strings: &'static [StringPitch] = match self {
            Instrument::Guitar => &GUITAR,
            Instrument::Bass => &BASS,
            Instrument::Ukulele => &UKULELE,
            Instrument::Violin => &VIOLIN,
            Instrument::Chromatic => &[],
        };
        InstrumentProfile {
            name: self.key(),
            strings,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Instrument {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|instrument| instrument.key() == key)
            .ok_or_else(|| TunerError::UnknownInstrument(s.to_string()))
    }
}

/// A string of a [`ScaledTuning`]: nominal label plus scaled frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledString {
    pub label: NoteLabel,
    pub frequency: f32,
}

/// An instrument profile rescaled to a particular reference pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledTuning {
    pub instrument: String,
    pub reference_hz: f32,
    pub strings: Vec<ScaledString>,
}

impl ScaledTuning {
    /// `true` when the instrument has no fixed strings to show.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Looks a string up by its nominal label, e.g. `"A2"`.
    ///
    /// Returns the first match; duplicated labels never occur in the
    /// built-in profiles.
    pub fn find(&self, label: &NoteLabel) -> Option<&ScaledString> {
        self.strings.iter().find(|s| s.label == *label)
    }
}

/// Scales a canonical profile to the given reference pitch.
///
/// # Arguments
/// * `profile` - Canonical tuning written at 440 Hz
/// * `reference` - Currently selected A4 frequency
///
/// # Returns
/// * `ScaledTuning` - Same labels and order, each frequency multiplied by
///   `reference / 440`. Pure: identical inputs give bit-identical output.
pub fn build_scaled_tuning(profile: &InstrumentProfile, reference: ReferencePitch) -> ScaledTuning {
    let ratio = reference.ratio_to_standard();
    ScaledTuning {
        instrument: profile.name.to_string(),
        reference_hz: reference.hz(),
        strings: profile
            .strings
            .iter()
            .map(|s| ScaledString {
                label: s.label,
                frequency: s.frequency * ratio,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn standard_reference_is_identity() {
        for instrument in Instrument::ALL {
            let profile = instrument.profile();
            let scaled = build_scaled_tuning(&profile, ReferencePitch::STANDARD);
            assert_eq!(scaled.strings.len(), profile.strings.len());
            for (canonical, scaled) in profile.strings.iter().zip(&scaled.strings) {
                assert_eq!(canonical.frequency.to_bits(), scaled.frequency.to_bits());
                assert_eq!(canonical.label, scaled.label);
            }
        }
    }

    #[test]
    fn doubling_reference_doubles_every_string() {
        let profile = Instrument::Guitar.profile();
        let base = build_scaled_tuning(&profile, ReferencePitch::STANDARD);
        let doubled = build_scaled_tuning(&profile, ReferencePitch::new(880.0).unwrap());
        for (a, b) in base.strings.iter().zip(&doubled.strings) {
            assert_eq!(b.frequency, a.frequency * 2.0);
        }
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let profile = Instrument::Violin.profile();
        let reference = ReferencePitch::new(443.0).unwrap();
        assert_eq!(
            build_scaled_tuning(&profile, reference),
            build_scaled_tuning(&profile, reference)
        );
    }

    #[test]
    fn labels_do_not_follow_the_reference() {
        let scaled = build_scaled_tuning(
            &Instrument::Bass.profile(),
            ReferencePitch::new(415.0).unwrap(),
        );
        let labels: Vec<String> = scaled.strings.iter().map(|s| s.label.to_string()).collect();
        assert_eq!(labels, ["E1", "A1", "D2", "G2"]);
        assert_relative_eq!(scaled.strings[1].frequency, 55.0 * 415.0 / 440.0, epsilon = 1e-4);
    }

    #[test]
    fn chromatic_has_no_strings() {
        let scaled = build_scaled_tuning(&Instrument::Chromatic.profile(), ReferencePitch::STANDARD);
        assert!(scaled.is_empty());
        assert_eq!(scaled.instrument, "chromatic");
    }

    #[test]
    fn ukulele_keeps_reentrant_order() {
        let labels: Vec<String> = Instrument::Ukulele
            .profile()
            .strings
            .iter()
            .map(|s| s.label.to_string())
            .collect();
        assert_eq!(labels, ["G4", "C4", "E4", "A4"]);
    }

    #[test]
    fn find_string_by_label() {
        let scaled = build_scaled_tuning(&Instrument::Guitar.profile(), ReferencePitch::STANDARD);
        let a2 = scaled.find(&"A2".parse().unwrap()).unwrap();
        assert_eq!(a2.frequency, 110.0);
        assert!(scaled.find(&"C5".parse().unwrap()).is_none());
    }

    #[test]
    fn instrument_keys_parse() {
        assert_eq!("guitar".parse::<Instrument>().unwrap(), Instrument::Guitar);
        assert_eq!(" Violin ".parse::<Instrument>().unwrap(), Instrument::Violin);
        assert!(matches!(
            "banjo".parse::<Instrument>(),
            Err(TunerError::UnknownInstrument(_))
        ));
        for instrument in Instrument::ALL {
            assert_eq!(instrument.key().parse::<Instrument>().unwrap(), instrument);
        }
    }

    #[test]
    fn instrument_serializes_as_lowercase_key() {
        let json = serde_json::to_string(&Instrument::Ukulele).unwrap();
        assert_eq!(json, "\"ukulele\"");
    }
}
