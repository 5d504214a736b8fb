//! Per-participant speech segmentation.
//!
//! [`SpeechSegmenter`] consumes normalized frames together with their
//! speech/non-speech classification and decides when an utterance ends:
//!
//! - `Idle` + speech: start buffering, the onset frame is part of the utterance
//! - `Speaking` + speech: append, reset the silence counter, accumulate duration
//! - `Speaking` + silence: count the frame, nothing is appended
//! - silence reaching the threshold, or accumulated speech reaching the cap,
//!   ends the utterance and returns the segmenter to `Idle` with an empty buffer
//!
//! The segmenter is a plain synchronous state machine; the session decides
//! whether a finished utterance may start a turn.

use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::core::audio::AudioFrame;

/// Segmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmenterConfig {
    /// Rate of the normalized frames, in Hz
    pub sample_rate: u32,
    /// Duration of one classified frame
    pub frame_ms: u32,
    /// Continuous silence that ends an utterance
    pub silence_threshold_ms: u32,
    /// Accumulated speech that forcibly ends an utterance
    pub max_speech_ms: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_ms: 30,
            silence_threshold_ms: 700,
            max_speech_ms: 20_000,
        }
    }
}

impl SegmenterConfig {
    /// Samples in one classified frame.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as u64 * self.frame_ms as u64 / 1000) as usize
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_ms as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechState {
    #[default]
    Idle,
    Speaking,
}

/// What ended an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnTrigger {
    Silence,
    MaxDuration,
}

/// Buffered speech handed to a turn: mono 16-bit little-endian PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub audio: Bytes,
    pub sample_rate: u32,
}

impl Utterance {
    pub fn new(audio: Bytes, sample_rate: u32) -> Self {
        Self { audio, sample_rate }
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }

    /// Number of 16-bit samples.
    pub fn samples(&self) -> usize {
        self.audio.len() / 2
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.samples() as u64 * 1_000_000_000 / self.sample_rate as u64)
    }
}

#[derive(Debug)]
pub struct SpeechSegmenter {
    config: SegmenterConfig,
    state: SpeechState,
    buffer: Vec<u8>,
    silence_frames: u32,
    speech_duration: Duration,
}

impl SpeechSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            state: SpeechState::Idle,
            buffer: Vec::new(),
            silence_frames: 0,
            speech_duration: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn state(&self) -> SpeechState {
        self.state
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn speech_duration(&self) -> Duration {
        self.speech_duration
    }

    pub fn silence_frames(&self) -> u32 {
        self.silence_frames
    }

    /// Feed one classified frame. Returns the finished utterance when this
    /// frame ends one.
    pub fn push(&mut self, frame: &AudioFrame, is_speech: bool) -> Option<(TurnTrigger, Utterance)> {
        match (self.state, is_speech) {
            (SpeechState::Idle, false) => return None,
            (SpeechState::Idle, true) => {
                self.state = SpeechState::Speaking;
                self.append(frame);
            }
            (SpeechState::Speaking, true) => self.append(frame),
            (SpeechState::Speaking, false) => {
                self.silence_frames = self.silence_frames.saturating_add(1);
            }
        }

        let max_speech = Duration::from_millis(self.config.max_speech_ms as u64);
        let silence_ms = self.silence_frames as u64 * self.config.frame_ms as u64;

        let trigger = if self.speech_duration >= max_speech {
            TurnTrigger::MaxDuration
        } else if silence_ms >= self.config.silence_threshold_ms as u64 {
            TurnTrigger::Silence
        } else {
            return None;
        };

        let utterance = self.take();
        if utterance.is_empty() {
            return None;
        }

        debug!(
            ?trigger,
            utterance_ms = utterance.duration().as_millis() as u64,
            "Utterance complete"
        );
        Some((trigger, utterance))
    }

    /// Drop anything buffered and return to `Idle`.
    pub fn reset(&mut self) {
        self.state = SpeechState::Idle;
        self.buffer.clear();
        self.silence_frames = 0;
        self.speech_duration = Duration::ZERO;
    }

    fn append(&mut self, frame: &AudioFrame) {
        for sample in &frame.data {
            self.buffer.extend_from_slice(&sample.to_le_bytes());
        }
        self.silence_frames = 0;
        self.speech_duration += frame.duration();
    }

    fn take(&mut self) -> Utterance {
        let audio = Bytes::from(std::mem::take(&mut self.buffer));
        self.reset();
        Utterance::new(audio, self.config.sample_rate)
    }
}
