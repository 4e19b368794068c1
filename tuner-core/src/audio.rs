//! # Audio Capture Module
//!
//! Frames reach the analysis cycle through the [`FrameSource`] contract: a
//! fixed sample rate for the whole session and a non-blocking read of the
//! most recent frame. [`CpalFrameSource`] implements it on top of CPAL
//! (Cross-Platform Audio Library) for the default input device.
//!
//! ## Features
//! - Automatic input device and format selection, mono preferred
//! - Downmixing of multichannel input
//! - Sliding analysis window published every hop
//! - Bounded hand-off so a slow consumer never blocks the audio callback

use std::ops::Deref;

use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::error::{Result, TunerError};

/// Number of samples per analysis frame.
///
/// Large enough to hold two periods of a 41 Hz bass E1 at 48 kHz.
pub const FRAME_SIZE: usize = 4096;

/// New samples between two published frames.
pub const HOP_SIZE: usize = 1024;

/// Preferred capture rate.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

// Frames waiting for the analysis side. New frames are dropped while it is full.
const FRAME_QUEUE_DEPTH: usize = 4;

/// An immutable block of mono samples, nominally in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Box<[f32]>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl From<Vec<f32>> for AudioFrame {
    fn from(samples: Vec<f32>) -> Self {
        Self::new(samples)
    }
}

impl Deref for AudioFrame {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.samples
    }
}

/// Supplier of analysis frames.
pub trait FrameSource {
    /// Sample rate of every frame this source produces, constant for its life.
    fn sample_rate(&self) -> u32;

    /// Returns the newest complete frame, or `None` if nothing new arrived
    /// since the previous call. Must not block.
    fn next_frame(&mut self) -> Option<AudioFrame>;
}

/// Turns interleaved device buffers into overlapping mono frames.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    hop_size: usize,
    channels: usize,
    history: Vec<f32>,
    pending: usize,
}

impl FrameAssembler {
    pub fn new(frame_size: usize, hop_size: usize, channels: usize) -> Self {
        Self {
            frame_size: frame_size.max(1),
            hop_size: hop_size.max(1),
            channels: channels.max(1),
            history: Vec::with_capacity(frame_size * 2),
            pending: 0,
        }
    }

    /// Appends an interleaved device buffer and calls `emit` with the
    /// newest window once at least a hop of fresh samples has accumulated.
    pub fn push(&mut self, interleaved: &[f32], mut emit: impl FnMut(AudioFrame)) {
        let before = self.history.len();
        if self.channels == 1 {
            self.history.extend_from_slice(interleaved);
        } else {
            let scale = 1.0 / self.channels as f32;
            self.history.extend(
                interleaved
                    .chunks_exact(self.channels)
                    .map(|frame| frame.iter().sum::<f32>() * scale),
            );
        }
        self.pending += self.history.len() - before;

        if self.history.len() > self.frame_size {
            let excess = self.history.len() - self.frame_size;
            self.history.drain(..excess);
        }

        if self.history.len() == self.frame_size && self.pending >= self.hop_size {
            emit(AudioFrame::new(self.history.clone()));
            self.pending %= self.hop_size;
        }
    }
}

/// Microphone capture through the default CPAL input device.
pub struct CpalFrameSource {
    stream: cpal::Stream,
    frames: Receiver<AudioFrame>,
    sample_rate: u32,
}

impl CpalFrameSource {
    /// Opens the default input device with [`FRAME_SIZE`] frames.
    pub fn open() -> Result<Self> {
        Self::open_with(FRAME_SIZE, HOP_SIZE)
    }

    /// Opens the default input device and starts streaming.
    ///
    /// # Returns
    /// * `Ok(source)` - Capture is running
    /// * `Err(TunerError::Acquisition)` - No device, no usable f32 format,
    ///   or the platform refused to open the stream (e.g. permission denied)
    pub fn open_with(frame_size: usize, hop_size: usize) -> Result<Self> {
        let acquisition = |e: &dyn std::fmt::Display| TunerError::Acquisition(e.to_string());

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| TunerError::Acquisition("no input device available".into()))?;

        match device.name() {
            Ok(name) => log::info!("[AUDIO] Using audio input device: {name}"),
            Err(e) => log::warn!("[AUDIO] Input device has no readable name: {e}"),
        }

        let configs = device
            .supported_input_configs()
            .map_err(|e| acquisition(&e))?
            .collect::<Vec<_>>();
        let supported = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| TunerError::Acquisition("no suitable f32 input format found".into()))?;

        let rate = clamp_rate(&supported, TARGET_SAMPLE_RATE);
        let channels = usize::from(supported.channels());
        let config: cpal::StreamConfig = supported.with_sample_rate(cpal::SampleRate(rate)).into();

        log::info!("[AUDIO] Selected sample rate: {rate} Hz, {channels} channel(s)");

        let (tx, rx) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
        let mut assembler = FrameAssembler::new(frame_size, hop_size, channels);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    assembler.push(data, |frame| publish(&tx, frame));
                },
                |err| log::error!("[AUDIO] An error occurred on the audio stream: {err}"),
                None,
            )
            .map_err(|e| acquisition(&e))?;

        stream.play().map_err(|e| acquisition(&e))?;

        Ok(Self {
            stream,
            frames: rx,
            sample_rate: rate,
        })
    }
}

impl FrameSource for CpalFrameSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self) -> Option<AudioFrame> {
        self.frames.try_iter().last()
    }
}

impl Drop for CpalFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("[AUDIO] Error pausing stream: {e}");
        }
        log::debug!("[AUDIO] Capture stream closed");
    }
}

fn publish(tx: &Sender<AudioFrame>, frame: AudioFrame) {
    // Send the frame, ignoring errors if the channel is full. The analysis
    // side only ever wants the newest one.
    if let Err(TrySendError::Disconnected(_)) = tx.try_send(frame) {
        log::trace!("[AUDIO] Frame receiver gone, dropping frame");
    }
}

/// Picks an f32 configuration, mono first, then the one whose rate range
/// lies closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let in_range = c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let distance = if in_range { 0 } else { min_diff.min(max_diff) };
            (c.channels() != 1, distance)
        })
}

fn clamp_rate(config: &SupportedStreamConfigRange, target_rate: u32) -> u32 {
    target_rate.clamp(config.min_sample_rate().0, config.max_sample_rate().0)
}
