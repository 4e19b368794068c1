//! # Reference Tone Module
//!
//! Plays a short sine at a string's frequency so the player can tune by ear.
//! Playback is fire-and-forget: each tone fades out and falls silent on its
//! own after [`TONE_DURATION_SECS`], and starting a new tone cancels the one
//! in flight.
//!
//! The output callback flags the tone as finished once the envelope has run
//! out. The device itself is released by [`TonePlayer::stop`], by the next
//! `play`, or when the player is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::{Result, TunerError};

/// Length of a reference tone.
pub const TONE_DURATION_SECS: f32 = 2.0;

/// Gain at the start of the tone.
pub const TONE_START_GAIN: f32 = 0.3;

/// Gain the exponential fade reaches at the end of the tone.
pub const TONE_END_GAIN: f32 = 0.001;

/// Something that can sound a reference pitch.
pub trait TonePlayer {
    /// Starts a tone, replacing any tone still playing.
    fn play(&mut self, frequency: f32) -> Result<()>;

    /// Silences the current tone, if any.
    fn stop(&mut self);
}

/// Envelope of a reference tone: exponential ramp from
/// [`TONE_START_GAIN`] to [`TONE_END_GAIN`], silent afterwards.
pub fn tone_gain(elapsed_secs: f32) -> f32 {
    if elapsed_secs >= TONE_DURATION_SECS {
        return 0.0;
    }
    let progress = elapsed_secs.max(0.0) / TONE_DURATION_SECS;
    TONE_START_GAIN * (TONE_END_GAIN / TONE_START_GAIN).powf(progress)
}

/// Sample generator for one reference tone.
#[derive(Debug, Clone)]
pub struct SineVoice {
    phase: f32,
    phase_step: f32,
    sample_rate: f32,
    elapsed: u64,
}

impl SineVoice {
    pub fn new(frequency: f32, sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            phase: 0.0,
            phase_step: std::f32::consts::TAU * frequency / sample_rate,
            sample_rate,
            elapsed: 0,
        }
    }

    /// `true` once the envelope has run out.
    pub fn finished(&self) -> bool {
        self.elapsed as f32 / self.sample_rate >= TONE_DURATION_SECS
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.finished() {
            return 0.0;
        }
        let gain = tone_gain(self.elapsed as f32 / self.sample_rate);
        let sample = gain * self.phase.sin();
        self.phase = (self.phase + self.phase_step) % std::f32::consts::TAU;
        self.elapsed += 1;
        sample
    }
}

/// Writes the next samples of `voice` into an interleaved output buffer.
///
/// Sets `finished` once the voice has gone silent.
pub fn fill_output(
    voice: &mut SineVoice,
    data: &mut [f32],
    channels: usize,
    finished: &AtomicBool,
) {
    for frame in data.chunks_mut(channels.max(1)) {
        frame.fill(voice.next_sample());
    }
    if voice.finished() {
        finished.store(true, Ordering::Release);
    }
}

struct ActiveTone {
    stream: cpal::Stream,
    finished: Arc<AtomicBool>,
}

/// Reference tones on the default CPAL output device.
#[derive(Default)]
pub struct CpalTonePlayer {
    current: Option<ActiveTone>,
}

impl CpalTonePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a tone is still sounding. Turns `false` when the tone
    /// has faded out, even if the stream has not been stopped yet.
    pub fn is_playing(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|tone| !tone.finished.load(Ordering::Acquire))
    }
}

impl TonePlayer for CpalTonePlayer {
    fn play(&mut self, frequency: f32) -> Result<()> {
        self.stop();

        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(TunerError::Tone(format!("invalid frequency {frequency} Hz")));
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| TunerError::Tone("no output device available".into()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| TunerError::Tone(e.to_string()))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(TunerError::Tone(format!(
                "unsupported output format {:?}",
                supported.sample_format()
            )));
        }

        let channels = usize::from(supported.channels()).max(1);
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();
        let mut voice = SineVoice::new(frequency, sample_rate);
        let finished = Arc::new(AtomicBool::new(false));
        let finished_flag = Arc::clone(&finished);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_output(&mut voice, data, channels, &finished_flag);
                },
                |err| log::error!("[TONE] An error occurred on the output stream: {err}"),
                None,
            )
            .map_err(|e| TunerError::Tone(e.to_string()))?;
        stream.play().map_err(|e| TunerError::Tone(e.to_string()))?;

        log::info!("[TONE] Playing {frequency:.2} Hz for {TONE_DURATION_SECS} s");
        self.current = Some(ActiveTone { stream, finished });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(tone) = self.current.take() {
            if let Err(e) = tone.stream.pause() {
                log::warn!("[TONE] Error pausing stream: {e}");
            }
            log::debug!("[TONE] Tone stopped");
        }
    }
}
