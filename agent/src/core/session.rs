//! Per-participant session.
//!
//! A [`ParticipantSession`] owns everything that belongs to one participant:
//! resampler history, the speech segmenter and the exclusive turn lock. Its
//! frame loop processes inbound frames strictly in arrival order:
//!
//! 1. while a turn is in flight the frame is discarded (drop-newest)
//! 2. the frame is normalized to 30 ms mono 16 kHz chunks
//! 3. each chunk is classified by the detector and fed to the segmenter
//! 4. a finished utterance takes the turn lock and runs on its own task
//!
//! Turn failures never reach the frame loop; the session is back to `Idle`
//! the moment a turn is triggered.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{OwnedMutexGuard, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::core::audio::{AudioError, AudioFrame, FrameResampler};
use crate::core::pipeline::{TurnPipeline, TurnResult};
use crate::core::playback::{PlaybackHandle, PlaybackRequest};
use crate::core::segmenter::{SegmenterConfig, SpeechSegmenter, SpeechState, TurnTrigger, Utterance};
use crate::core::vad::SpeechDetector;
use crate::errors::{OrchestratorError, TurnStage};

/// How a turn ended, as reported on the event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Audio was handed to the playback scheduler
    Answered { audio_bytes: usize },
    NoSpeech,
    TranscriptionEmpty,
    UpstreamFailure { stage: TurnStage, detail: String },
    /// The participant left before the turn completed
    Abandoned,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Answered { .. } => "answered",
            TurnOutcome::NoSpeech => "no_speech",
            TurnOutcome::TranscriptionEmpty => "transcription_empty",
            TurnOutcome::UpstreamFailure { .. } => "upstream_failure",
            TurnOutcome::Abandoned => "abandoned",
        }
    }
}

/// Turn lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Started {
        participant: String,
        trigger: TurnTrigger,
        utterance_ms: u64,
    },
    Finished {
        participant: String,
        outcome: TurnOutcome,
    },
}

impl TurnEvent {
    pub fn participant(&self) -> &str {
        match self {
            TurnEvent::Started { participant, .. } | TurnEvent::Finished { participant, .. } => {
                participant
            }
        }
    }
}

/// Collaborators and settings shared by every session.
pub struct SessionContext {
    pub detector: Arc<dyn SpeechDetector>,
    pub pipeline: TurnPipeline,
    pub playback: PlaybackHandle,
    pub segmenter: SegmenterConfig,
    pub detect_timeout: Duration,
    pub events: broadcast::Sender<TurnEvent>,
}

/// Point-in-time copy of a session's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub frames_received: u64,
    /// Discarded because a turn was in flight
    pub frames_dropped: u64,
    pub invalid_frames: u64,
    pub detector_failures: u64,
    pub turns_started: u64,
}

#[derive(Debug, Default)]
struct SessionStats {
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    invalid_frames: AtomicU64,
    detector_failures: AtomicU64,
    turns_started: AtomicU64,
}

pub struct ParticipantSession {
    identity: String,
    ctx: Arc<SessionContext>,
    resampler: Mutex<FrameResampler>,
    segmenter: Mutex<SpeechSegmenter>,
    turn_lock: Arc<tokio::sync::Mutex<()>>,
    turn_task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    stats: SessionStats,
}

impl ParticipantSession {
    pub fn new(identity: impl Into<String>, ctx: Arc<SessionContext>) -> Arc<Self> {
        let segmenter = ctx.segmenter;
        Arc::new(Self {
            identity: identity.into(),
            resampler: Mutex::new(FrameResampler::new(
                segmenter.sample_rate,
                segmenter.frame_duration(),
            )),
            segmenter: Mutex::new(SpeechSegmenter::new(segmenter)),
            turn_lock: Arc::new(tokio::sync::Mutex::new(())),
            turn_task: Mutex::new(None),
            cancel: CancellationToken::new(),
            stats: SessionStats::default(),
            ctx,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn speech_state(&self) -> SpeechState {
        self.segmenter.lock().state()
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.turn_lock.try_lock().is_err()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn counters(&self) -> SessionCounters {
        SessionCounters {
            frames_received: self.stats.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.stats.frames_dropped.load(Ordering::Relaxed),
            invalid_frames: self.stats.invalid_frames.load(Ordering::Relaxed),
            detector_failures: self.stats.detector_failures.load(Ordering::Relaxed),
            turns_started: self.stats.turns_started.load(Ordering::Relaxed),
        }
    }

    /// Consume inbound frames until the stream ends or the session is closed.
    pub async fn run<S>(self: Arc<Self>, frames: S)
    where
        S: Stream<Item = AudioFrame> + Send,
    {
        let mut frames = pin!(frames);
        info!(participant = %self.identity, "Frame loop started");

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                frame = frames.next() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.handle_frame(frame) => {}
            }
        }

        info!(participant = %self.identity, "Frame loop ended");
    }

    /// Process one inbound transport frame.
    pub async fn handle_frame(self: &Arc<Self>, frame: AudioFrame) {
        self.stats.frames_received.fetch_add(1, Ordering::Relaxed);

        if self.is_turn_in_flight() {
            self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
            trace!(participant = %self.identity, "Turn in flight, frame discarded");
            return;
        }

        let chunks = match self.resampler.lock().resample(&frame) {
            Ok(chunks) => chunks,
            Err(AudioError::InvalidFrame(detail)) => {
                self.stats.invalid_frames.fetch_add(1, Ordering::Relaxed);
                let error = OrchestratorError::InvalidFrame(detail);
                warn!(participant = %self.identity, %error, "Dropping frame");
                return;
            }
            Err(e) => {
                self.stats.invalid_frames.fetch_add(1, Ordering::Relaxed);
                warn!(participant = %self.identity, error = %e, "Dropping frame");
                return;
            }
        };

        for chunk in chunks {
            let is_speech = self.classify(&chunk).await;
            let finished = self.segmenter.lock().push(&chunk, is_speech);
            if let Some((trigger, utterance)) = finished {
                // Whatever is left of this frame arrives while the turn holds the lock
                self.start_turn(trigger, utterance);
                break;
            }
        }
    }

    async fn classify(&self, chunk: &AudioFrame) -> bool {
        let result =
            tokio::time::timeout(self.ctx.detect_timeout, self.ctx.detector.detect(chunk)).await;
        let detail = match result {
            Ok(Ok(detection)) => return detection.is_speech,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "timed out after {} ms",
                self.ctx.detect_timeout.as_millis()
            ),
        };

        self.stats.detector_failures.fetch_add(1, Ordering::Relaxed);
        let error = OrchestratorError::DetectorUnavailable(detail);
        debug!(participant = %self.identity, %error, "Treating frame as non-speech");
        false
    }

    fn start_turn(self: &Arc<Self>, trigger: TurnTrigger, utterance: Utterance) {
        let guard = match self.turn_lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(participant = %self.identity, "Turn already in flight, utterance discarded");
                return;
            }
        };

        self.stats.turns_started.fetch_add(1, Ordering::Relaxed);
        // Audio buffered before the turn must not leak into the next utterance
        self.resampler.lock().reset();

        let session = Arc::clone(self);
        let task = tokio::spawn(async move { session.run_turn(guard, trigger, utterance).await });
        *self.turn_task.lock() = Some(task);
    }

    async fn run_turn(&self, _guard: OwnedMutexGuard<()>, trigger: TurnTrigger, utterance: Utterance) {
        let participant = self.identity.as_str();
        let utterance_ms = utterance.duration().as_millis() as u64;
        info!(participant, ?trigger, utterance_ms, "Turn started");
        self.emit(TurnEvent::Started {
            participant: self.identity.clone(),
            trigger,
            utterance_ms,
        });

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.ctx.pipeline.run_turn(participant, utterance) => Some(result),
        };

        let outcome = match result {
            None => TurnOutcome::Abandoned,
            Some(TurnResult::Answered(audio)) => self.enqueue_playback(audio).await,
            Some(TurnResult::NoSpeech) => TurnOutcome::NoSpeech,
            Some(TurnResult::TranscriptionEmpty) => TurnOutcome::TranscriptionEmpty,
            Some(TurnResult::UpstreamFailure { stage, detail }) => {
                TurnOutcome::UpstreamFailure { stage, detail }
            }
        };

        info!(participant, outcome = outcome.as_str(), "Turn finished");
        self.emit(TurnEvent::Finished {
            participant: self.identity.clone(),
            outcome,
        });
    }

    async fn enqueue_playback(&self, audio: bytes::Bytes) -> TurnOutcome {
        let audio_bytes = audio.len();
        let request = PlaybackRequest {
            participant: self.identity.clone(),
            audio,
            cancel: self.cancel.clone(),
        };

        let enqueued = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return TurnOutcome::Abandoned,
            enqueued = self.ctx.playback.enqueue(request) => enqueued,
        };

        match enqueued {
            Ok(()) => TurnOutcome::Answered { audio_bytes },
            Err(e) => {
                warn!(participant = %self.identity, error = %e, "Answer audio not played");
                TurnOutcome::Abandoned
            }
        }
    }

    fn emit(&self, event: TurnEvent) {
        // No subscribers is fine
        let _ = self.ctx.events.send(event);
    }

    /// Stop the frame loop and any in-flight turn, then wait for the turn task.
    pub async fn close(&self) {
        self.cancel.cancel();
        let task = self.turn_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(participant = %self.identity, error = %e, "Turn task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::answer::{AnswerEvent, AnswerResult, AnswerService, AnswerStream};
    use crate::core::pipeline::{StageTimeouts, TurnServices};
    use crate::core::playback::{AudioSink, PlaybackConfig, PlaybackScheduler, TransportError};
    use crate::core::stt::{STTResult, Transcriber};
    use crate::core::tts::{Synthesizer, TTSResult};
    use crate::core::vad::{Detection, VADError, VADResult};
    use async_trait::async_trait;
    use bytes::Bytes;

    /// Frames whose first sample is positive are speech.
    struct AmplitudeDetector;

    #[async_trait]
    impl SpeechDetector for AmplitudeDetector {
        async fn detect(&self, frame: &AudioFrame) -> VADResult<Detection> {
            Ok(if frame.data[0] > 0 {
                Detection::speech(0.9)
            } else {
                Detection::silence()
            })
        }
    }

    struct BrokenDetector;

    #[async_trait]
    impl SpeechDetector for BrokenDetector {
        async fn detect(&self, _frame: &AudioFrame) -> VADResult<Detection> {
            Err(VADError::NetworkError("down".into()))
        }
    }

    struct SlowTranscriber;

    #[async_trait]
    impl Transcriber for SlowTranscriber {
        async fn transcribe(&self, _utterance: &Utterance) -> STTResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("hello".into())
        }
    }

    struct Echo;

    #[async_trait]
    impl AnswerService for Echo {
        async fn stream_answer(&self, _user_id: &str, query: &str) -> AnswerResult<AnswerStream> {
            let events = vec![Ok(AnswerEvent::Chunk(query.to_string()))];
            Ok(futures::stream::iter(events).boxed())
        }
    }

    struct NoAudio;

    #[async_trait]
    impl Synthesizer for NoAudio {
        async fn synthesize(&self, _text: &str, _language: &str) -> TTSResult<Bytes> {
            Ok(Bytes::from_static(b"undecodable"))
        }
    }

    struct NullSink;

    #[async_trait]
    impl AudioSink for NullSink {
        async fn capture_frame(&self, _frame: AudioFrame) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn session(detector: Arc<dyn SpeechDetector>) -> (Arc<ParticipantSession>, broadcast::Receiver<TurnEvent>) {
        session_with(detector, SegmenterConfig::default())
    }

    fn session_with(
        detector: Arc<dyn SpeechDetector>,
        segmenter: SegmenterConfig,
    ) -> (Arc<ParticipantSession>, broadcast::Receiver<TurnEvent>) {
        let (playback, _task) = PlaybackScheduler::spawn(Arc::new(NullSink), PlaybackConfig::default());
        let (events, rx) = broadcast::channel(16);
        let ctx = SessionContext {
            detector,
            pipeline: TurnPipeline::new(
                TurnServices {
                    transcriber: Arc::new(SlowTranscriber),
                    answers: Arc::new(Echo),
                    synthesizer: Arc::new(NoAudio),
                },
                "bn",
                StageTimeouts::default(),
            ),
            playback,
            segmenter,
            detect_timeout: Duration::from_secs(2),
            events,
        };
        (ParticipantSession::new("alice", Arc::new(ctx)), rx)
    }

    fn normalized(value: i16) -> AudioFrame {
        AudioFrame::new(vec![value; 480], 16000, 1)
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_triggered_and_frames_dropped_while_in_flight() {
        let (session, mut events) = session(Arc::new(AmplitudeDetector));

        for _ in 0..10 {
            session.handle_frame(normalized(1000)).await;
        }
        assert_eq!(session.speech_state(), SpeechState::Speaking);
        for _ in 0..24 {
            session.handle_frame(normalized(0)).await;
        }
        assert_eq!(session.speech_state(), SpeechState::Idle);

        match events.recv().await.unwrap() {
            TurnEvent::Started { utterance_ms, trigger, .. } => {
                assert_eq!(utterance_ms, 300);
                assert_eq!(trigger, TurnTrigger::Silence);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(session.is_turn_in_flight());

        // Speech during the turn is discarded, not queued
        for _ in 0..40 {
            session.handle_frame(normalized(1000)).await;
        }
        assert_eq!(session.speech_state(), SpeechState::Idle);
        assert_eq!(session.counters().frames_dropped, 40);
        assert_eq!(session.counters().turns_started, 1);

        match events.recv().await.unwrap() {
            TurnEvent::Finished { outcome, .. } => {
                assert_eq!(outcome, TurnOutcome::Answered { audio_bytes: 11 })
            }
            other => panic!("unexpected event {other:?}"),
        }
        tokio::task::yield_now().await;
        assert!(!session.is_turn_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leftover_audio_discarded_when_turn_starts() {
        let (session, mut events) = session_with(
            Arc::new(AmplitudeDetector),
            SegmenterConfig {
                max_speech_ms: 60,
                ..SegmenterConfig::default()
            },
        );

        // 70 ms of speech: two full frames hit the cap, 10 ms stay buffered
        session
            .handle_frame(AudioFrame::new(vec![1000; 1120], 16000, 1))
            .await;
        match events.recv().await.unwrap() {
            TurnEvent::Started { trigger, utterance_ms, .. } => {
                assert_eq!(trigger, TurnTrigger::MaxDuration);
                assert_eq!(utterance_ms, 60);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(events.recv().await.unwrap(), TurnEvent::Finished { .. }));
        tokio::task::yield_now().await;
        assert!(!session.is_turn_in_flight());

        // Silence after the turn starts a clean frame
        session.handle_frame(normalized(0)).await;
        assert_eq!(session.speech_state(), SpeechState::Idle);
        assert_eq!(session.counters().turns_started, 1);
    }

    #[tokio::test]
    async fn test_invalid_frame_dropped() {
        let (session, _events) = session(Arc::new(AmplitudeDetector));
        session
            .handle_frame(AudioFrame {
                data: vec![1, 2, 3],
                sample_rate: 0,
                num_channels: 1,
                samples_per_channel: 3,
            })
            .await;
        assert_eq!(session.counters().invalid_frames, 1);
        assert_eq!(session.speech_state(), SpeechState::Idle);

        session.handle_frame(normalized(1000)).await;
        assert_eq!(session.speech_state(), SpeechState::Speaking);
    }

    #[tokio::test]
    async fn test_detector_failure_counts_as_silence() {
        let (session, _events) = session(Arc::new(BrokenDetector));
        for _ in 0..50 {
            session.handle_frame(normalized(1000)).await;
        }
        assert_eq!(session.speech_state(), SpeechState::Idle);
        assert_eq!(session.counters().detector_failures, 50);
        assert_eq!(session.counters().turns_started, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_abandons_in_flight_turn() {
        let (session, mut events) = session(Arc::new(AmplitudeDetector));
        session.handle_frame(normalized(1000)).await;
        for _ in 0..24 {
            session.handle_frame(normalized(0)).await;
        }
        assert!(matches!(events.recv().await.unwrap(), TurnEvent::Started { .. }));

        session.close().await;
        assert!(session.is_closed());
        assert!(!session.is_turn_in_flight());
        assert_eq!(
            events.recv().await.unwrap(),
            TurnEvent::Finished {
                participant: "alice".into(),
                outcome: TurnOutcome::Abandoned,
            }
        );
    }

    #[tokio::test]
    async fn test_run_stops_at_end_of_stream() {
        let (session, _events) = session(Arc::new(AmplitudeDetector));
        let frames = futures::stream::iter(vec![normalized(1000), normalized(1000)]);
        session.clone().run(frames).await;
        assert_eq!(session.counters().frames_received, 2);
    }
}
