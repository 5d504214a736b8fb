//! Audio primitives shared by the orchestration core
//!
//! - [`AudioFrame`]: fixed-duration chunk of interleaved 16-bit PCM
//! - [`FrameResampler`]: per-participant streaming conversion of transport
//!   frames into the mono 16 kHz frames the speech detector expects
//! - [`codec`]: decoding of synthesized payloads (MP3/WAV) and WAV envelope
//!   encoding of utterances

pub mod codec;
mod frame;
mod resampler;

pub use frame::{AudioFrame, bytes_to_samples, f32_to_i16, i16_to_f32, samples_to_bytes};
pub use resampler::{FrameResampler, resample_mono};

use thiserror::Error;

/// Errors produced while handling raw or encoded audio.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AudioError {
    /// Inbound frame is malformed (zero rate, zero channels, size mismatch)
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Resampler could not be built or failed while processing
    #[error("Resampling failed: {0}")]
    Resample(String),

    /// Compressed payload could not be decoded
    #[error("Decode failed: {0}")]
    Decode(String),

    /// PCM could not be wrapped in a container
    #[error("Encode failed: {0}")]
    Encode(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
