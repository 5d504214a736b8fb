//! Serialized playback onto the shared outbound track.
//!
//! Every session's synthesized audio goes through one bounded queue drained by
//! a single worker task, so frames from two turns never interleave on the
//! track. The worker decodes each payload, converts it to the outbound format,
//! slices it into fixed frames (zero-padding the last one) and emits them at
//! real-time cadence.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::audio::{AudioFrame, AudioResult, codec, f32_to_i16, resample_mono};
use crate::errors::OrchestratorError;

/// Failure to hand a frame to the conferencing transport.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Failed to capture frame: {0}")]
    CaptureFailed(String),
}

/// Outbound end of the shared track.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn capture_frame(&self, frame: AudioFrame) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlaybackError {
    #[error("Playback scheduler is not running")]
    SchedulerStopped,
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Outbound format and pacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackConfig {
    pub sample_rate: u32,
    pub channels: u32,
    pub frame_ms: u32,
    /// Fraction of a frame's duration slept after emitting it
    pub pacing_factor: f64,
    /// Payloads that may wait behind the one playing
    pub queue_depth: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            frame_ms: 20,
            pacing_factor: 0.95,
            queue_depth: 16,
        }
    }
}

impl PlaybackConfig {
    /// Samples per channel in one outbound frame.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as u64 * self.frame_ms as u64 / 1000) as usize
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_ms as u64)
    }

    pub fn pacing_interval(&self) -> Duration {
        self.frame_duration().mul_f64(self.pacing_factor)
    }
}

/// One payload waiting for the track.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub participant: String,
    pub audio: Bytes,
    /// Cancelled when the originating session is gone; checked before and
    /// during emission
    pub cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct PlaybackStats {
    payloads_played: AtomicU64,
    payloads_skipped: AtomicU64,
    decode_failures: AtomicU64,
    frames_emitted: AtomicU64,
}

/// Cloneable handle for enqueuing audio on the scheduler.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    tx: mpsc::Sender<PlaybackRequest>,
    shutdown: CancellationToken,
    stats: Arc<PlaybackStats>,
}

impl PlaybackHandle {
    /// Queue a payload. Waits while the queue is full.
    pub async fn enqueue(&self, request: PlaybackRequest) -> PlaybackResult<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| PlaybackError::SchedulerStopped)
    }

    /// Stop the worker after the frame currently being emitted.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn frames_emitted(&self) -> u64 {
        self.stats.frames_emitted.load(Ordering::Relaxed)
    }

    pub fn payloads_played(&self) -> u64 {
        self.stats.payloads_played.load(Ordering::Relaxed)
    }

    pub fn payloads_skipped(&self) -> u64 {
        self.stats.payloads_skipped.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> u64 {
        self.stats.decode_failures.load(Ordering::Relaxed)
    }
}

pub struct PlaybackScheduler {
    sink: Arc<dyn AudioSink>,
    config: PlaybackConfig,
    rx: mpsc::Receiver<PlaybackRequest>,
    shutdown: CancellationToken,
    stats: Arc<PlaybackStats>,
}

impl PlaybackScheduler {
    /// Start the worker. It runs until shut down or until every handle is dropped.
    pub fn spawn(sink: Arc<dyn AudioSink>, config: PlaybackConfig) -> (PlaybackHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let shutdown = CancellationToken::new();
        let stats = Arc::new(PlaybackStats::default());

        let scheduler = PlaybackScheduler {
            sink,
            config,
            rx,
            shutdown: shutdown.clone(),
            stats: stats.clone(),
        };
        let task = tokio::spawn(scheduler.run());

        (
            PlaybackHandle {
                tx,
                shutdown,
                stats,
            },
            task,
        )
    }

    async fn run(mut self) {
        info!(
            sample_rate = self.config.sample_rate,
            channels = self.config.channels,
            frame_ms = self.config.frame_ms,
            "Playback scheduler started"
        );

        loop {
            let request = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                request = self.rx.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            self.play(request).await;
        }

        info!("Playback scheduler stopped");
    }

    async fn play(&self, request: PlaybackRequest) {
        let participant = request.participant.as_str();
        if request.cancel.is_cancelled() {
            debug!(participant, "Skipping playback for departed participant");
            self.stats.payloads_skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let config = self.config;
        let audio = request.audio.clone();
        let frames = match tokio::task::spawn_blocking(move || prepare_frames(&audio, &config)).await {
            Ok(Ok(frames)) => frames,
            Ok(Err(e)) => {
                let error = OrchestratorError::PlaybackDecodeFailure(e.to_string());
                warn!(participant, %error, "Dropping playback");
                self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) => {
                let error = OrchestratorError::PlaybackDecodeFailure(format!("decoder task failed: {e}"));
                warn!(participant, %error, "Dropping playback");
                self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        debug!(participant, frames = frames.len(), "Playing synthesized audio");
        let pace = config.pacing_interval();

        for frame in frames {
            if request.cancel.is_cancelled() || self.shutdown.is_cancelled() {
                debug!(participant, "Playback interrupted");
                self.stats.payloads_skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            if let Err(e) = self.sink.capture_frame(frame).await {
                let error = OrchestratorError::Transport(e.to_string());
                error!(participant, %error, "Outbound track rejected frame");
                return;
            }
            self.stats.frames_emitted.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(pace).await;
        }

        self.stats.payloads_played.fetch_add(1, Ordering::Relaxed);
    }
}

/// Decode a payload and slice it into outbound frames.
///
/// The final frame is zero-padded to the full frame size.
pub fn prepare_frames(payload: &[u8], config: &PlaybackConfig) -> AudioResult<Vec<AudioFrame>> {
    let decoded = codec::decode_payload(payload)?;
    let mono = codec::to_mono(&decoded.samples, decoded.channels);
    let mono = resample_mono(&mono, decoded.sample_rate, config.sample_rate)?;
    let samples: Vec<i16> = codec::from_mono(&mono, config.channels)
        .into_iter()
        .map(f32_to_i16)
        .collect();

    let channels = config.channels.max(1);
    let frame_len = config.frame_samples() * channels as usize;
    if frame_len == 0 {
        return Ok(Vec::new());
    }

    let frames = samples
        .chunks(frame_len)
        .map(|chunk| {
            let mut data = chunk.to_vec();
            data.resize(frame_len, 0);
            AudioFrame::new(data, config.sample_rate, channels)
        })
        .collect();
    Ok(frames)
}
