//! Audio Test Fixtures
//!
//! Using generated audio ensures:
//! - Consistent, reproducible test inputs
//! - No external file dependencies
//! - Precise control over amplitude, which the mock detector keys on
//!
//! Frames produced here carry a constant "marker" amplitude so that tests can
//! tell whose audio ended up where (e.g. on the shared outbound track).

use std::f32::consts::PI;

use voice_agent::core::audio::{AudioFrame, codec};

/// Detector input rate
pub const SAMPLE_RATE: u32 = 16000;

/// Samples in one 30 ms detector frame
pub const FRAME_SAMPLES: usize = 480;

/// Outbound track rate and frame size
pub const OUTBOUND_RATE: u32 = 48000;
pub const OUTBOUND_FRAME_SAMPLES: usize = 960;

/// Default speech marker amplitude
pub const SPEECH_LEVEL: i16 = 3000;

/// Generate silence (zeros)
pub fn generate_silence(duration_samples: usize) -> Vec<i16> {
    vec![0i16; duration_samples]
}

/// Generate a sine wave tone at `sample_rate`
pub fn generate_sine_wave(
    duration_samples: usize,
    sample_rate: u32,
    frequency: f32,
    amplitude: f32,
) -> Vec<i16> {
    let max_amplitude = amplitude * i16::MAX as f32;
    let angular_freq = 2.0 * PI * frequency / sample_rate as f32;

    (0..duration_samples)
        .map(|i| ((angular_freq * i as f32).sin() * max_amplitude) as i16)
        .collect()
}

/// One 30 ms detector frame filled with `level`
pub fn marker_frame(level: i16) -> AudioFrame {
    AudioFrame::new(vec![level; FRAME_SAMPLES], SAMPLE_RATE, 1)
}

/// `count` consecutive speech frames at `level`
pub fn speech_frames(count: usize, level: i16) -> Vec<AudioFrame> {
    (0..count).map(|_| marker_frame(level)).collect()
}

/// `count` consecutive silent frames
pub fn silence_frames(count: usize) -> Vec<AudioFrame> {
    (0..count).map(|_| marker_frame(0)).collect()
}

/// Speech followed by enough silence to end the utterance (24 frames, 720 ms)
pub fn utterance_frames(speech: usize, level: i16) -> Vec<AudioFrame> {
    let mut frames = speech_frames(speech, level);
    frames.extend(silence_frames(24));
    frames
}

/// 10 ms transport frames, 48 kHz stereo, carrying a 300 Hz tone
pub fn transport_tone_frames(count: usize, amplitude: f32) -> Vec<AudioFrame> {
    let mono = generate_sine_wave(count * 480, OUTBOUND_RATE, 300.0, amplitude);
    mono.chunks(480)
        .map(|chunk| {
            let stereo: Vec<i16> = chunk.iter().flat_map(|s| [*s, *s]).collect();
            AudioFrame::new(stereo, OUTBOUND_RATE, 2)
        })
        .collect()
}

/// A WAV payload of `samples` constant samples at `sample_rate`
pub fn wav_payload(samples: usize, sample_rate: u32, level: i16) -> Vec<u8> {
    codec::encode_wav(&vec![level; samples], sample_rate, 1).expect("wav encoding")
}

/// RMS level of a block of samples
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}
