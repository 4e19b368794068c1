//! # Tuner - Command Line Instrument Tuner
//!
//! Terminal front end for `tuner-core`: listens to the default microphone,
//! shows the nearest note with its cents deviation, lists and plays the
//! reference strings of the selected instrument, and keeps the reference
//! pitch and instrument in a small JSON settings file.
//!
//! ## Architecture
//! - **Main Thread**: drives the analysis session on a fixed tick
//! - **Audio Thread**: owned by CPAL, publishes frames into a bounded queue
//! - **Settings**: loaded once per command, saved by the `set` commands

mod display;
mod store;

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tuner_core::instrument::ScaledString;
use tuner_core::pitch::is_admissible;
use tuner_core::settings::load_or_default;
use tuner_core::tone::TONE_DURATION_SECS;
use tuner_core::{
    CpalFrameSource, CpalTonePlayer, Instrument, NoiseGate, NoteLabel, ReferencePitch,
    ScaledTuning, Settings, SettingsStore, TonePlayer, TunerSession, YinFactory,
    build_scaled_tuning, read_frequency,
};

use display::{Display, describe, render_strings};
use store::{DEFAULT_SETTINGS_PATH, JsonFileStore};

// Nominal display refresh, ~60 Hz.
const DEFAULT_TICK_MS: u64 = 16;

const TONE_POLL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "tuner", about = "Chromatic and instrument tuner")]
struct Cli {
    /// Settings file holding the reference pitch and selected instrument
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tune from the default microphone
    Listen {
        /// Stop after this many seconds (runs until interrupted otherwise)
        #[arg(long)]
        seconds: Option<f32>,
        /// RMS level below which input counts as silence
        #[arg(long)]
        gate_threshold: Option<f32>,
        #[arg(long, default_value_t = DEFAULT_TICK_MS)]
        tick_ms: u64,
    },
    /// Print the string table of an instrument
    Strings {
        #[arg(long)]
        instrument: Option<String>,
        /// A4 in Hz, overriding the saved reference
        #[arg(long)]
        reference: Option<u32>,
    },
    /// Play the reference tone of a string (1-based index or label, e.g. "A2")
    Play { string: String },
    /// Map a frequency to its nearest note
    Note { hz: f32 },
    /// Change a saved setting
    #[command(subcommand)]
    Set(SetCommand),
    /// Show the saved settings
    Show,
}

#[derive(Subcommand, Debug)]
enum SetCommand {
    /// Reference pitch for A4, 400-480 Hz
    Reference { hz: u32 },
    /// Instrument key: guitar, bass, ukulele, violin or chromatic
    Instrument { key: String },
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut store = JsonFileStore::new(cli.settings.clone());
    let settings = load_or_default(&store);

    match cli.command.unwrap_or(Commands::Listen {
        seconds: None,
        gate_threshold: None,
        tick_ms: DEFAULT_TICK_MS,
    }) {
        Commands::Listen {
            seconds,
            gate_threshold,
            tick_ms,
        } => {
            let gate = gate_threshold.map(NoiseGate::new).unwrap_or_default();
            let deadline = seconds.map(listen_duration).transpose()?;
            listen(settings, gate, deadline, Duration::from_millis(tick_ms.max(1)))?;
        }
        Commands::Strings {
            instrument,
            reference,
        } => {
            let instrument = match instrument {
                Some(key) => key.parse::<Instrument>()?,
                None => settings.instrument,
            };
            let reference = match reference {
                Some(hz) => ReferencePitch::new(Settings::validate_reference(hz)? as f32)?,
                None => settings.reference_pitch(),
            };
            print!("{}", render_strings(&build_scaled_tuning(&instrument.profile(), reference)));
        }
        Commands::Play { string } => {
            let session = TunerSession::new(settings);
            let target = resolve_string(session.scaled_tuning(), &string)?;
            play(target)?;
        }
        Commands::Note { hz } => {
            let reading = read_frequency(hz, settings.reference_pitch())
                .filter(|_| is_admissible(hz))
                .ok_or_else(|| anyhow!("{hz} Hz is outside the detectable range"))?;
            println!("{}", describe(&reading));
        }
        Commands::Set(SetCommand::Reference { hz }) => {
            let mut session = TunerSession::new(settings);
            session.set_reference_pitch(hz)?;
            store.save(&session.settings())?;
            println!("Reference pitch set to A4 = {hz} Hz");
        }
        Commands::Set(SetCommand::Instrument { key }) => {
            let mut session = TunerSession::new(settings);
            session.select_instrument(&key)?;
            store.save(&session.settings())?;
            println!("Instrument set to {}", session.instrument());
        }
        Commands::Show => {
            println!("settings file: {}", store.path().display());
            println!("reference:     A4 = {} Hz", settings.reference_hz);
            println!("instrument:    {}", settings.instrument);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Runs the analysis session on the microphone until `deadline` elapses.
///
/// Prints a line whenever the readout changes.
fn listen(
    settings: Settings,
    gate: NoiseGate,
    deadline: Option<Duration>,
    tick: Duration,
) -> Result<()> {
    let mut session = TunerSession::new(settings).with_gate(gate);
    session
        .start(CpalFrameSource::open, &YinFactory::default())
        .context("Could not access microphone. Check that an input device is connected and permitted")?;

    log::info!(
        "[MAIN] Listening at {} Hz, A4 = {} Hz, {}",
        session.sample_rate().unwrap_or_default(),
        session.reference_pitch().hz(),
        session.instrument()
    );
    print!("{}", render_strings(session.scaled_tuning()));
    println!();

    let mut display = Display::default();
    println!("{}", display.render());

    let started = Instant::now();
    while deadline.is_none_or(|d| started.elapsed() < d) {
        if let Some(report) = session.run_cycle() {
            if display.apply(&report) {
                println!("{}", display.render());
            }
        }
        thread::sleep(tick);
    }

    session.stop();
    display.reset();
    println!("{}", display.render());
    Ok(())
}

/// Converts `--seconds` into a duration, rejecting negative, NaN, infinite
/// and overly large values.
fn listen_duration(seconds: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(seconds)
        .with_context(|| format!("invalid --seconds value {seconds}"))
}

/// Finds a string of `tuning` by 1-based index or by note label.
fn resolve_string(tuning: &ScaledTuning, arg: &str) -> Result<ScaledString> {
    if tuning.is_empty() {
        bail!("{} has no fixed strings", tuning.instrument);
    }
    if let Ok(index) = arg.trim().parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| tuning.strings.get(i))
            .copied()
            .ok_or_else(|| {
                anyhow!(
                    "string {index} out of range, {} has {} strings",
                    tuning.instrument,
                    tuning.strings.len()
                )
            });
    }
    let label: NoteLabel = arg.parse()?;
    tuning
        .find(&label)
        .copied()
        .ok_or_else(|| anyhow!("{} has no {label} string", tuning.instrument))
}

fn play(target: ScaledString) -> Result<()> {
    let mut player = CpalTonePlayer::new();
    player
        .play(target.frequency)
        .context("Could not play the reference tone")?;
    println!("Playing {} at {:.2} Hz", target.label, target.frequency);

    // Poll until the tone has faded, with a margin in case the device
    // stops calling back.
    let deadline = Instant::now() + Duration::from_secs_f32(TONE_DURATION_SECS + 1.0);
    while player.is_playing() && Instant::now() < deadline {
        thread::sleep(TONE_POLL);
    }
    player.stop();
    Ok(())
}
