//! # Musical Tuning Module
//!
//! Quantizes frequencies to equal-tempered notes relative to an adjustable
//! reference pitch, and measures how far a frequency sits from its note.
//!
//! ## Features
//! - Chromatic pitch classes starting at C, with sharp spelling
//! - Absolute (MIDI-style) note indices, 69 = A4 at the reference pitch
//! - Note label parsing and formatting ("E2", "C#4", "Bb3")
//! - Cent deviation against the exact note frequency
//!
//! ## Rounding
//! Both the semitone quantization and the cent value use round-half-away-
//! from-zero (`f64::round`). A frequency exactly half a semitone above a note
//! therefore maps to the upper note at -50 cents, and exactly half a semitone
//! below maps to the lower note at +50 cents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// Absolute note index of A4.
pub const A4_INDEX: i32 = 69;

/// Concert pitch all canonical instrument tables are written against.
pub const STANDARD_PITCH_HZ: f32 = 440.0;

/// The twelve pitch classes of the chromatic scale, starting at C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Pitch class for any semitone offset from C. Wraps cyclically, so
    /// negative offsets are fine.
    pub fn from_offset(offset: i32) -> Self {
        Self::ALL[offset.rem_euclid(12) as usize]
    }

    /// Semitones above C, in 0..12.
    pub fn offset(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A nominal note name: pitch class plus octave, e.g. `E2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteLabel {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl NoteLabel {
    pub const fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self { pitch_class, octave }
    }

    /// Label of an absolute note index.
    pub fn from_index(index: i32) -> Self {
        Self {
            pitch_class: PitchClass::from_offset(index),
            octave: index.div_euclid(12) - 1,
        }
    }

    /// Absolute note index, `12 * (octave + 1) + pitch class offset`.
    pub fn absolute_index(&self) -> i32 {
        12 * (self.octave + 1) + self.pitch_class.offset()
    }
}

impl fmt::Display for NoteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for NoteLabel {
    type Err = TunerError;

    /// Parses labels such as `A4`, `C#3`, `Bb2` or `E-1`.
    ///
    /// Flats are respelled as the enharmonic sharp, so `Db4` parses to `C#4`
    /// and `Cb4` to `B3`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TunerError::InvalidNoteName(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.chars();

        let letter = chars.next().ok_or_else(invalid)?;
        let natural = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };

        let rest = chars.as_str();
        let (accidental, octave_text) = if let Some(r) = rest.strip_prefix('#') {
            (1, r)
        } else if let Some(r) = rest.strip_prefix('b') {
            (-1, r)
        } else {
            (0, rest)
        };

        let octave: i32 = octave_text.parse().map_err(|_| invalid())?;
        let index = octave
            .checked_add(1)
            .and_then(|o| o.checked_mul(12))
            .and_then(|base| base.checked_add(natural + accidental))
            .ok_or_else(invalid)?;
        Ok(Self::from_index(index))
    }
}

/// A quantized musical note.
///
/// Invariant: `absolute_index == 12 * (octave + 1) + pitch_class.offset()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub pitch_class: PitchClass,
    pub octave: i32,
    pub absolute_index: i32,
}

impl Note {
    /// Builds the note for an absolute index.
    pub fn from_index(absolute_index: i32) -> Self {
        let label = NoteLabel::from_index(absolute_index);
        Self {
            pitch_class: label.pitch_class,
            octave: label.octave,
            absolute_index,
        }
    }

    pub fn label(&self) -> NoteLabel {
        NoteLabel::new(self.pitch_class, self.octave)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.label().fmt(f)
    }
}

/// Frequency assigned to A4. Always positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ReferencePitch(f32);

impl ReferencePitch {
    /// A4 = 440 Hz.
    pub const STANDARD: ReferencePitch = ReferencePitch(STANDARD_PITCH_HZ);

    /// Validates a reference pitch.
    ///
    /// # Returns
    /// * `Ok(ReferencePitch)` - for any positive, finite frequency
    /// * `Err(TunerError::InvalidReferencePitch)` - otherwise, since the
    ///   note math would take the logarithm of a non-positive ratio
    pub fn new(hz: f32) -> Result<Self> {
        if hz.is_finite() && hz > 0.0 {
            Ok(Self(hz))
        } else {
            Err(TunerError::InvalidReferencePitch(hz))
        }
    }

    pub fn hz(self) -> f32 {
        self.0
    }

    /// Scale factor from the 440 Hz convention to this reference.
    pub fn ratio_to_standard(self) -> f32 {
        self.0 / STANDARD_PITCH_HZ
    }
}

impl Default for ReferencePitch {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Maps a frequency to the nearest equal-tempered note.
///
/// # Arguments
/// * `freq` - Frequency in Hz
/// * `reference` - Frequency of A4
///
/// # Returns
/// * `Some(note)` - for every positive, finite frequency
/// * `None` - for zero, negative or non-finite input
pub fn map_to_note(freq: f32, reference: ReferencePitch) -> Option<Note> {
    if !(freq.is_finite() && freq > 0.0) {
        return None;
    }
    let semitones = 12.0 * (f64::from(freq) / f64::from(reference.hz())).log2();
    let index = semitones.round() as i32 + A4_INDEX;
    Some(Note::from_index(index))
}

/// Exact equal-tempered frequency of an absolute note index.
pub fn note_frequency(absolute_index: i32, reference: ReferencePitch) -> f32 {
    exact_frequency(absolute_index, reference) as f32
}

fn exact_frequency(absolute_index: i32, reference: ReferencePitch) -> f64 {
    f64::from(reference.hz()) * 2f64.powf(f64::from(absolute_index - A4_INDEX) / 12.0)
}

/// Whole-cent distance between `freq` and the exact frequency of `note`.
///
/// For a note obtained from [`map_to_note`] with the same reference the
/// result is always within [-50, 50].
pub fn cents_off(freq: f32, note: &Note, reference: ReferencePitch) -> i32 {
    let exact = exact_frequency(note.absolute_index, reference);
    (1200.0 * (f64::from(freq) / exact).log2()).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn hz(value: f32) -> ReferencePitch {
        ReferencePitch::new(value).unwrap()
    }

    #[test]
    fn a440_maps_to_a4() {
        let note = map_to_note(440.0, ReferencePitch::STANDARD).unwrap();
        assert_eq!(note.pitch_class, PitchClass::A);
        assert_eq!(note.octave, 4);
        assert_eq!(note.absolute_index, 69);
        assert_eq!(cents_off(440.0, &note, ReferencePitch::STANDARD), 0);
    }

    #[test]
    fn octave_doubling_keeps_pitch_class() {
        let note = map_to_note(880.0, ReferencePitch::STANDARD).unwrap();
        assert_eq!(note.pitch_class, PitchClass::A);
        assert_eq!(note.octave, 5);
        assert_eq!(cents_off(880.0, &note, ReferencePitch::STANDARD), 0);
    }

    #[test]
    fn octave_boundary_falls_on_c() {
        let b3 = map_to_note(246.94, ReferencePitch::STANDARD).unwrap();
        let c4 = map_to_note(261.63, ReferencePitch::STANDARD).unwrap();
        assert_eq!(b3.to_string(), "B3");
        assert_eq!(c4.to_string(), "C4");
        assert_eq!(c4.absolute_index, 60);
    }

    #[test]
    fn reference_pitch_shifts_the_grid() {
        // 432 Hz is A4 when the reference is 432, and 32 cents flat of A4 at 440.
        let note = map_to_note(432.0, hz(432.0)).unwrap();
        assert_eq!(note.to_string(), "A4");
        assert_eq!(cents_off(432.0, &note, hz(432.0)), 0);

        let note = map_to_note(432.0, ReferencePitch::STANDARD).unwrap();
        assert_eq!(note.to_string(), "A4");
        assert_eq!(cents_off(432.0, &note, ReferencePitch::STANDARD), -32);
    }

    #[test]
    fn sub_audio_frequencies_get_negative_octaves() {
        // Index 0 is C-1 (8.18 Hz); one semitone lower wraps to B-2.
        let c = map_to_note(8.1758, ReferencePitch::STANDARD).unwrap();
        assert_eq!(c.absolute_index, 0);
        assert_eq!(c.to_string(), "C-1");

        let b = map_to_note(7.7169, ReferencePitch::STANDARD).unwrap();
        assert_eq!(b.absolute_index, -1);
        assert_eq!(b.pitch_class, PitchClass::B);
        assert_eq!(b.octave, -2);
    }

    #[test]
    fn just_past_half_semitone_rounds_up_to_minus_fifty() {
        let freq = 440.0 * 2f32.powf(0.5002 / 12.0);
        let note = map_to_note(freq, ReferencePitch::STANDARD).unwrap();
        assert_eq!(note.pitch_class, PitchClass::ASharp);
        assert_eq!(cents_off(freq, &note, ReferencePitch::STANDARD), -50);
    }

    #[test]
    fn non_positive_frequencies_have_no_note() {
        assert_eq!(map_to_note(0.0, ReferencePitch::STANDARD), None);
        assert_eq!(map_to_note(-110.0, ReferencePitch::STANDARD), None);
        assert_eq!(map_to_note(f32::NAN, ReferencePitch::STANDARD), None);
        assert_eq!(map_to_note(f32::INFINITY, ReferencePitch::STANDARD), None);
    }

    #[test]
    fn reference_pitch_rejects_non_positive_values() {
        assert!(ReferencePitch::new(0.0).is_err());
        assert!(ReferencePitch::new(-440.0).is_err());
        assert!(ReferencePitch::new(f32::NAN).is_err());
        assert_eq!(ReferencePitch::new(442.0).unwrap().hz(), 442.0);
    }

    #[test]
    fn note_frequency_inverts_mapping() {
        assert_relative_eq!(note_frequency(69, ReferencePitch::STANDARD), 440.0);
        assert_relative_eq!(note_frequency(57, ReferencePitch::STANDARD), 220.0);
        assert_relative_eq!(note_frequency(40, ReferencePitch::STANDARD), 82.4069, epsilon = 1e-3);
    }

    #[test]
    fn cents_are_signed() {
        let a4 = map_to_note(440.0, ReferencePitch::STANDARD).unwrap();
        assert_eq!(cents_off(439.0, &a4, ReferencePitch::STANDARD), -4);
        assert_eq!(cents_off(441.0, &a4, ReferencePitch::STANDARD), 4);
        assert_eq!(cents_off(880.0, &a4, ReferencePitch::STANDARD), 1200);
    }

    #[test]
    fn labels_round_trip_through_text() {
        for text in ["E2", "C#4", "A4", "G#-1", "B10"] {
            let label: NoteLabel = text.parse().unwrap();
            assert_eq!(label.to_string(), text);
        }
    }

    #[test]
    fn flats_are_respelled_as_sharps() {
        assert_eq!("Bb2".parse::<NoteLabel>().unwrap().to_string(), "A#2");
        assert_eq!("Db4".parse::<NoteLabel>().unwrap().to_string(), "C#4");
        assert_eq!("Cb4".parse::<NoteLabel>().unwrap().to_string(), "B3");
        assert_eq!("e2".parse::<NoteLabel>().unwrap().to_string(), "E2");
    }

    #[test]
    fn malformed_labels_are_rejected() {
        for text in ["", "H2", "A", "C#", "A4x", "##4", "C999999999", "C-999999999", "B2147483646"] {
            assert!(
                matches!(text.parse::<NoteLabel>(), Err(TunerError::InvalidNoteName(_))),
                "{text:?} should not parse"
            );
        }
    }

    proptest! {
        #[test]
        fn mapping_is_total_and_cents_are_bounded(
            freq in 0.5f32..20_000.0,
            reference in 400u32..=480,
        ) {
            let reference = ReferencePitch::new(reference as f32).unwrap();
            let note = map_to_note(freq, reference).unwrap();
            let cents = cents_off(freq, &note, reference);
            prop_assert!((-50..=50).contains(&cents), "cents {} for {} Hz", cents, freq);
            prop_assert_eq!(
                note.absolute_index,
                12 * (note.octave + 1) + note.pitch_class.offset()
            );
        }

        #[test]
        fn labels_and_indices_agree(index in -24i32..160) {
            let note = Note::from_index(index);
            prop_assert_eq!(note.label().absolute_index(), index);
            let parsed: NoteLabel = note.to_string().parse().unwrap();
            prop_assert_eq!(parsed, note.label());
        }
    }
}
