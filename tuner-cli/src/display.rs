//! Text rendering of the tuner readout.
//!
//! Holds the "display state" the analysis results act on: a gate rejection
//! resets it, a cycle without a valid pitch leaves it as it was.

use tuner_core::classify::DISPLAY_RANGE_CENTS;
use tuner_core::{AnalysisResult, CycleReport, ScaledTuning, TuneState, TuningReading};

const NEEDLE_WIDTH: usize = 21;
const METER_WIDTH: usize = 10;

/// What the readout currently shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Readout {
    #[default]
    Neutral,
    Reading(TuningReading),
}

/// The readout plus the input meter.
#[derive(Debug, Clone, Default)]
pub struct Display {
    readout: Readout,
    level_percent: f32,
}

impl Display {
    /// Applies one cycle. Returns `true` if the readout changed.
    pub fn apply(&mut self, report: &CycleReport) -> bool {
        self.level_percent = report.level.level_percent;
        let next = match report.result {
            Some(AnalysisResult::NoSignal) => Readout::Neutral,
            Some(AnalysisResult::Tuning(reading)) => Readout::Reading(reading),
            None => return false,
        };
        let changed = next != self.readout;
        self.readout = next;
        changed
    }

    /// Back to the idle look: neutral readout, empty meter.
    pub fn reset(&mut self) {
        self.readout = Readout::Neutral;
        self.level_percent = 0.0;
    }

    pub fn render(&self) -> String {
        let meter = level_bar(self.level_percent, METER_WIDTH);
        match &self.readout {
            Readout::Neutral => format!(
                "{:<4} {:>9}  {:<13} {}  {}",
                "--",
                "-- Hz",
                "-- cents",
                needle_bar(0.0, NEEDLE_WIDTH),
                meter
            ),
            Readout::Reading(reading) => format!(
                "{:<4} {:>9}  {:<13} {}  {}",
                reading.note.to_string(),
                format!("{:.1} Hz", reading.frequency),
                cents_text(reading),
                needle_bar(reading.classification.needle_position(), NEEDLE_WIDTH),
                meter
            ),
        }
    }
}

/// "In Tune", "+12 cents" or "-7 cents".
pub fn cents_text(reading: &TuningReading) -> String {
    match reading.classification.state {
        TuneState::InTune => "In Tune".to_string(),
        TuneState::Sharp => format!("+{} cents", reading.cents),
        TuneState::Flat => format!("{} cents", reading.cents),
    }
}

/// Horizontal needle: `position` in [-1, 1] mapped across `width` cells,
/// with the centre marked.
pub fn needle_bar(position: f32, width: usize) -> String {
    let width = width.max(3) | 1;
    let centre = width / 2;
    let offset = (position.clamp(-1.0, 1.0) * centre as f32).round() as isize;
    let needle = (centre as isize + offset) as usize;

    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    for i in 0..width {
        bar.push(if i == needle {
            '^'
        } else if i == centre {
            '|'
        } else {
            '-'
        });
    }
    bar.push(']');
    bar
}

/// Meter bar plus rounded percentage, e.g. `#####----- 50%`.
pub fn level_bar(percent: f32, width: usize) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let filled = ((percent / 100.0) * width as f32).round() as usize;
    format!(
        "{}{} {:>3}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        percent.round() as u32
    )
}

/// String table listing, one string per line.
pub fn render_strings(tuning: &ScaledTuning) -> String {
    if tuning.is_empty() {
        return format!(
            "{} has no fixed strings (A4 = {} Hz)\n",
            tuning.instrument, tuning.reference_hz
        );
    }
    let mut out = format!("{} at A4 = {} Hz\n", tuning.instrument, tuning.reference_hz);
    for (i, string) in tuning.strings.iter().enumerate() {
        out.push_str(&format!(
            "{:>2}  {:<4} {:>7.1} Hz\n",
            i + 1,
            string.label.to_string(),
            string.frequency
        ));
    }
    out
}

/// Full description of a single reading, for one-shot lookups.
pub fn describe(reading: &TuningReading) -> String {
    format!(
        "{:.2} Hz -> {} ({}), needle {:+.0}° of ±{} cents",
        reading.frequency,
        reading.note,
        cents_text(reading),
        reading.classification.needle_angle(),
        DISPLAY_RANGE_CENTS
    )
}
