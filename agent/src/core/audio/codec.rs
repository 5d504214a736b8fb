//! Container and codec handling.
//!
//! Synthesized answers arrive as compressed payloads (MP3 from the speech
//! synthesizer, WAV in tests and for some synthesizer deployments); utterances
//! leave as WAV envelopes for the transcriber.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use super::{AudioError, AudioResult};

/// Decoded PCM audio, interleaved, normalized to -1.0..=1.0.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u32,
}

impl DecodedAudio {
    /// Number of samples per channel.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// Decode a compressed audio payload (MP3 or WAV) into interleaved PCM.
pub fn decode_payload(payload: &[u8]) -> AudioResult<DecodedAudio> {
    if payload.is_empty() {
        return Err(AudioError::Decode("payload is empty".to_string()));
    }

    let source = Cursor::new(payload.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Decode(format!("failed to probe audio: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AudioError::Decode("no default audio track".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels = codec_params
        .channels
        .map(|c| c.count() as u32)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("failed to create decoder: {e}")))?;

    let mut out: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(AudioError::Decode(format!("audio read error: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Corrupt packets are skipped, the rest of the stream may still decode
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(AudioError::Decode(format!("audio decode error: {e}"))),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u32;
        let frames = decoded.frames() as u64;
        let required = (frames as usize).saturating_mul(channels as usize);

        let needs_new = match sample_buf.as_ref() {
            Some(b) => b.capacity() < required,
            None => true,
        };
        if needs_new {
            sample_buf = Some(SampleBuffer::<f32>::new(frames, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            out.extend_from_slice(buf.samples());
        }
    }

    if out.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(AudioError::Decode("payload contained no audio".to_string()));
    }

    debug!(
        "Decoded {} bytes into {} samples ({} Hz, {} ch)",
        payload.len(),
        out.len(),
        sample_rate,
        channels
    );

    Ok(DecodedAudio {
        samples: out,
        sample_rate,
        channels,
    })
}

/// Downmix to mono by averaging interleaved channels.
pub fn to_mono(samples: &[f32], channels: u32) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|group| group.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Duplicate a mono signal across `channels` interleaved channels.
pub fn from_mono(mono: &[f32], channels: u32) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return mono.to_vec();
    }
    let mut out = Vec::with_capacity(mono.len() * channels);
    for &s in mono {
        for _ in 0..channels {
            out.push(s);
        }
    }
    out
}

/// Wrap 16-bit PCM in a WAV envelope.
pub fn encode_wav(pcm: &[i16], sample_rate: u32, channels: u16) -> AudioResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AudioError::Encode(format!("failed to create wav writer: {e}")))?;
        for &sample in pcm {
            writer
                .write_sample(sample)
                .map_err(|e| AudioError::Encode(format!("failed to write wav sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| AudioError::Encode(format!("failed to finalize wav: {e}")))?;
    }
    Ok(cursor.into_inner())
}
