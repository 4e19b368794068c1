//! Tuning classification: in-tune / sharp / flat, plus the bounded value a
//! needle or bar indicator is driven from.

use serde::{Deserialize, Serialize};

/// Half-width of the in-tune window, in cents (inclusive).
pub const IN_TUNE_CENTS: i32 = 5;

/// Display range of the deviation indicator, in cents either side of zero.
pub const DISPLAY_RANGE_CENTS: i32 = 50;

/// Needle deflection at the edge of the display range, in degrees.
pub const NEEDLE_SWING_DEGREES: f32 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TuneState {
    InTune,
    Sharp,
    Flat,
}

/// Judgment for one cents reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub state: TuneState,
    /// Cents clamped to [-50, 50].
    pub clamped_cents: i32,
}

impl Classification {
    /// Needle position normalised to [-1, 1]; 0 is centred.
    pub fn needle_position(&self) -> f32 {
        self.clamped_cents as f32 / DISPLAY_RANGE_CENTS as f32
    }

    /// Needle angle in degrees, linear over ±[`NEEDLE_SWING_DEGREES`].
    pub fn needle_angle(&self) -> f32 {
        self.needle_position() * NEEDLE_SWING_DEGREES
    }
}

/// Classifies a cents deviation.
///
/// `|cents| <= 5` is in tune, above is sharp, below is flat.
pub fn classify(cents: i32) -> Classification {
    let state = if (-IN_TUNE_CENTS..=IN_TUNE_CENTS).contains(&cents) {
        TuneState::InTune
    } else if cents > 0 {
        TuneState::Sharp
    } else {
        TuneState::Flat
    };
    Classification {
        state,
        clamped_cents: cents.clamp(-DISPLAY_RANGE_CENTS, DISPLAY_RANGE_CENTS),
    }
}
