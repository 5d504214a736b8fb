use std::time::Duration;

use bytes::Bytes;

use super::{AudioError, AudioResult};

/// Scale factor for converting PCM 16-bit samples to normalized float (-1.0 to 1.0)
const PCM_TO_FLOAT_SCALE: f32 = 1.0 / 32768.0;

/// A fixed-duration chunk of interleaved linear PCM samples.
///
/// Frames are treated as immutable once produced; every transformation
/// (resampling, remixing, padding) yields a new frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Interleaved 16-bit samples
    pub data: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub num_channels: u32,
    /// Samples per channel (`data.len() / num_channels`)
    pub samples_per_channel: u32,
}

impl AudioFrame {
    /// Build a frame from interleaved samples, deriving `samples_per_channel`.
    pub fn new(data: Vec<i16>, sample_rate: u32, num_channels: u32) -> Self {
        let samples_per_channel = if num_channels == 0 {
            0
        } else {
            (data.len() / num_channels as usize) as u32
        };
        Self {
            data,
            sample_rate,
            num_channels,
            samples_per_channel,
        }
    }

    /// A frame of digital silence.
    pub fn silence(sample_rate: u32, num_channels: u32, samples_per_channel: u32) -> Self {
        Self {
            data: vec![0; (samples_per_channel * num_channels) as usize],
            sample_rate,
            num_channels,
            samples_per_channel,
        }
    }

    /// Check the frame's layout is self-consistent.
    pub fn validate(&self) -> AudioResult<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidFrame("sample rate is zero".to_string()));
        }
        if self.num_channels == 0 {
            return Err(AudioError::InvalidFrame("channel count is zero".to_string()));
        }
        if self.data.is_empty() {
            return Err(AudioError::InvalidFrame("frame carries no samples".to_string()));
        }
        let expected = self.samples_per_channel as usize * self.num_channels as usize;
        if self.data.len() != expected {
            return Err(AudioError::InvalidFrame(format!(
                "expected {} samples ({} x {} channels), got {}",
                expected,
                self.samples_per_channel,
                self.num_channels,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Real-time duration of the frame.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(
            self.samples_per_channel as u64 * 1_000_000_000 / self.sample_rate as u64,
        )
    }

    /// Little-endian byte encoding of the samples.
    pub fn to_le_bytes(&self) -> Bytes {
        Bytes::from(samples_to_bytes(&self.data))
    }
}

/// Encode samples as little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Decode little-endian bytes into samples. A trailing odd byte is ignored.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 * PCM_TO_FLOAT_SCALE
}

#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
