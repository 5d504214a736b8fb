//! Streaming and one-shot sample-rate conversion.

use std::time::Duration;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use super::frame::{AudioFrame, f32_to_i16, i16_to_f32};
use super::{AudioError, AudioResult};

/// Chunk size for one-shot buffer conversion (frames per channel)
const BUFFER_CHUNK_SIZE: usize = 1024;

fn sinc_parameters() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Downmix interleaved samples to mono by averaging channels.
fn downmix_to_mono(frame: &AudioFrame) -> Vec<f32> {
    let channels = frame.num_channels as usize;
    if channels == 1 {
        return frame.data.iter().map(|&s| i16_to_f32(s)).collect();
    }
    frame
        .data
        .chunks_exact(channels)
        .map(|group| group.iter().map(|&s| i16_to_f32(s)).sum::<f32>() / channels as f32)
        .collect()
}

/// Per-participant converter from transport frames to detector frames.
///
/// Accepts frames of any rate and channel count, downmixes to mono, resamples
/// to `target_rate` and re-chunks the result into frames of exactly
/// `frame_duration`. Filter history and partially filled frames carry over
/// between calls, so one instance must never be shared across participants.
pub struct FrameResampler {
    target_rate: u32,
    frame_samples: usize,
    /// Input rate the current filter was built for
    input_rate: Option<u32>,
    filter: Option<SincFixedIn<f32>>,
    /// Mono input waiting for a full filter chunk
    pending_input: Vec<f32>,
    /// Converted samples waiting for a full output frame
    pending_output: Vec<i16>,
}

impl FrameResampler {
    pub fn new(target_rate: u32, frame_duration: Duration) -> Self {
        let frame_samples =
            ((target_rate as u64 * frame_duration.as_millis() as u64) / 1000) as usize;
        Self {
            target_rate,
            frame_samples: frame_samples.max(1),
            input_rate: None,
            filter: None,
            pending_input: Vec::new(),
            pending_output: Vec::with_capacity(frame_samples * 2),
        }
    }

    /// Samples per emitted frame.
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Convert one transport frame, returning every normalized frame completed by it.
    ///
    /// Malformed frames fail with [`AudioError::InvalidFrame`] and leave the
    /// internal state untouched.
    pub fn resample(&mut self, frame: &AudioFrame) -> AudioResult<Vec<AudioFrame>> {
        frame.validate()?;

        if self.input_rate != Some(frame.sample_rate) {
            self.rebuild(frame.sample_rate)?;
        }

        let mono = downmix_to_mono(frame);

        match self.filter.as_mut() {
            None => self
                .pending_output
                .extend(mono.into_iter().map(f32_to_i16)),
            Some(filter) => {
                self.pending_input.extend_from_slice(&mono);
                loop {
                    let needed = filter.input_frames_next();
                    if self.pending_input.len() < needed {
                        break;
                    }
                    let chunk: Vec<Vec<f32>> = vec![self.pending_input.drain(..needed).collect()];
                    let output = filter
                        .process(&chunk, None)
                        .map_err(|e| AudioError::Resample(e.to_string()))?;
                    self.pending_output
                        .extend(output[0].iter().map(|&s| f32_to_i16(s)));
                }
            }
        }

        let mut frames = Vec::new();
        while self.pending_output.len() >= self.frame_samples {
            let data: Vec<i16> = self.pending_output.drain(..self.frame_samples).collect();
            frames.push(AudioFrame::new(data, self.target_rate, 1));
        }
        Ok(frames)
    }

    /// Drop buffered audio and filter history.
    pub fn reset(&mut self) {
        if let Some(rate) = self.input_rate.take() {
            debug!("Resetting resampler built for {} Hz", rate);
        }
        self.filter = None;
        self.pending_input.clear();
        self.pending_output.clear();
    }

    fn rebuild(&mut self, input_rate: u32) -> AudioResult<()> {
        self.reset();
        if input_rate != self.target_rate {
            let ratio = self.target_rate as f64 / input_rate as f64;
            // 10ms of input per filter pass
            let chunk_size = (input_rate as usize / 100).max(1);
            let filter = SincFixedIn::<f32>::new(ratio, 1.0, sinc_parameters(), chunk_size, 1)
                .map_err(|e| AudioError::Resample(format!("Failed to create resampler: {e}")))?;
            self.filter = Some(filter);
        }
        debug!(
            "Resampler configured: {} Hz -> {} Hz mono, {} samples per frame",
            input_rate, self.target_rate, self.frame_samples
        );
        self.input_rate = Some(input_rate);
        Ok(())
    }
}

/// Resample a complete mono buffer.
///
/// The output length is exactly `round(len * to_rate / from_rate)`; the
/// filter's group delay is trimmed from the front and the tail is flushed.
pub fn resample_mono(input: &[f32], from_rate: u32, to_rate: u32) -> AudioResult<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(AudioError::Resample(
            "Sample rates must be greater than 0".to_string(),
        ));
    }
    if input.is_empty() || from_rate == to_rate {
        return Ok(input.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let expected = (input.len() as f64 * ratio).round() as usize;

    let mut filter = SincFixedIn::<f32>::new(ratio, 1.0, sinc_parameters(), BUFFER_CHUNK_SIZE, 1)
        .map_err(|e| AudioError::Resample(format!("Failed to create resampler: {e}")))?;
    let delay = filter.output_delay();

    let mut output = Vec::with_capacity(expected + delay + BUFFER_CHUNK_SIZE);
    let mut position = 0;

    while input.len() - position >= filter.input_frames_next() {
        let needed = filter.input_frames_next();
        let chunk = vec![input[position..position + needed].to_vec()];
        let processed = filter
            .process(&chunk, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&processed[0]);
        position += needed;
    }

    if position < input.len() {
        let chunk = vec![input[position..].to_vec()];
        let processed = filter
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&processed[0]);
    }

    // Flush the samples still held back by the filter delay
    while output.len() < expected + delay {
        let processed = filter
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if processed[0].is_empty() {
            break;
        }
        output.extend_from_slice(&processed[0]);
    }

    let mut trimmed: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
    trimmed.resize(expected, 0.0);
    Ok(trimmed)
}
