//! In-process collaborators for driving the orchestration core
//!
//! - `LevelDetector`: speech when a frame's RMS is above a threshold
//! - `MockTranscriber`: scripted or level-derived transcripts, optional delay
//! - `MockAnswers`: echoes or scripted answer events, counts clears
//! - `MockSynthesizer`: WAV payloads, either fixed or derived from the text
//! - `RecordingSink`: records every frame put on the outbound track
//!
//! Every mock counts its calls so tests can assert which stages ran.

// Allow dead code in test infrastructure - not every test binary uses every mock
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use voice_agent::core::answer::{AnswerEvent, AnswerResult, AnswerService, AnswerStream};
use voice_agent::core::audio::{AudioFrame, bytes_to_samples, codec};
use voice_agent::core::stt::{STTError, STTResult, Transcriber};
use voice_agent::core::tts::{Synthesizer, TTSResult};
use voice_agent::core::vad::{Detection, SpeechDetector, VADResult};
use voice_agent::core::{
    AudioSink, ConferenceEvent, PlaybackConfig, PlaybackScheduler, SessionManager,
    SessionManagerConfig, StageTimeouts, TransportError, TurnEvent, TurnOutcome, TurnPipeline,
    TurnServices, Utterance,
};

use crate::fixtures::{OUTBOUND_RATE, calculate_rms};

// =============================================================================
// Detector
// =============================================================================

pub struct LevelDetector {
    threshold: f32,
    pub calls: AtomicUsize,
}

impl LevelDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeechDetector for LevelDetector {
    async fn detect(&self, frame: &AudioFrame) -> VADResult<Detection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rms = calculate_rms(&frame.data);
        Ok(if rms > self.threshold {
            Detection::speech(0.9)
        } else {
            Detection::silence()
        })
    }
}

// =============================================================================
// Transcriber
// =============================================================================

#[derive(Clone)]
pub enum Transcript {
    /// Always the same text
    Fixed(String),
    /// The utterance's first sample value, as text
    Level,
    Fail(String),
}

pub struct MockTranscriber {
    transcript: Transcript,
    delay: Duration,
    pub calls: AtomicUsize,
    /// Sample counts of every utterance received
    pub utterances: Mutex<Vec<usize>>,
}

impl MockTranscriber {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            utterances: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, utterance: &Utterance) -> STTResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.utterances.lock().push(utterance.samples());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.transcript {
            Transcript::Fixed(text) => Ok(text.clone()),
            Transcript::Level => {
                let samples = bytes_to_samples(&utterance.audio);
                Ok(samples.first().copied().unwrap_or_default().to_string())
            }
            Transcript::Fail(detail) => Err(STTError::ProviderError(detail.clone())),
        }
    }
}

// =============================================================================
// Answer service
// =============================================================================

pub struct MockAnswers {
    /// `None` echoes the query back as a single chunk
    scripted: Option<Vec<AnswerEvent>>,
    pub calls: AtomicUsize,
    pub clears: AtomicUsize,
    pub queries: Mutex<Vec<(String, String)>>,
}

impl MockAnswers {
    pub fn echo() -> Self {
        Self {
            scripted: None,
            calls: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(events: Vec<AnswerEvent>) -> Self {
        Self {
            scripted: Some(events),
            ..Self::echo()
        }
    }
}

#[async_trait]
impl AnswerService for MockAnswers {
    async fn stream_answer(&self, user_id: &str, query: &str) -> AnswerResult<AnswerStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .push((user_id.to_string(), query.to_string()));
        let events = match &self.scripted {
            Some(events) => events.clone(),
            None => vec![AnswerEvent::Chunk(query.to_string())],
        };
        let events: Vec<AnswerResult<AnswerEvent>> = events.into_iter().map(Ok).collect();
        Ok(futures::stream::iter(events).boxed())
    }

    async fn clear_session(&self, _user_id: &str) -> AnswerResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Synthesizer
// =============================================================================

#[derive(Clone)]
pub enum Speech {
    /// `samples` of constant `level` at 48 kHz
    Constant { samples: usize, level: i16 },
    /// `samples` at 48 kHz whose level is the text parsed as a number
    LevelFromText { samples: usize },
    /// A payload that cannot be decoded
    Garbage,
}

pub struct MockSynthesizer {
    speech: Speech,
    delay: Duration,
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    pub fn new(speech: Speech) -> Self {
        Self {
            speech,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

fn constant_wav(samples: usize, level: i16) -> Bytes {
    Bytes::from(codec::encode_wav(&vec![level; samples], OUTBOUND_RATE, 1).expect("wav encoding"))
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str) -> TTSResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(match &self.speech {
            Speech::Constant { samples, level } => constant_wav(*samples, *level),
            Speech::LevelFromText { samples } => {
                constant_wav(*samples, text.trim().parse().unwrap_or(1))
            }
            Speech::Garbage => Bytes::from_static(b"this is not audio"),
        })
    }
}

// =============================================================================
// Outbound track
// =============================================================================

#[derive(Default)]
pub struct RecordingSink {
    pub frames: Mutex<Vec<AudioFrame>>,
}

impl RecordingSink {
    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    /// First sample of every recorded frame
    pub fn markers(&self) -> Vec<i16> {
        self.frames.lock().iter().map(|f| f.data[0]).collect()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn capture_frame(&self, frame: AudioFrame) -> Result<(), TransportError> {
        self.frames.lock().push(frame);
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub manager: SessionManager,
    pub events: broadcast::Receiver<TurnEvent>,
    pub detector: Arc<LevelDetector>,
    pub transcriber: Arc<MockTranscriber>,
    pub answers: Arc<MockAnswers>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub sink: Arc<RecordingSink>,
    pub playback_task: JoinHandle<()>,
}

impl Harness {
    pub fn new(transcriber: MockTranscriber, answers: MockAnswers, synthesizer: MockSynthesizer) -> Self {
        Self::with_detector(Arc::new(LevelDetector::new(500.0)), transcriber, answers, synthesizer)
    }

    pub fn with_detector(
        detector: Arc<LevelDetector>,
        transcriber: MockTranscriber,
        answers: MockAnswers,
        synthesizer: MockSynthesizer,
    ) -> Self {
        let transcriber = Arc::new(transcriber);
        let answers = Arc::new(answers);
        let synthesizer = Arc::new(synthesizer);
        let sink = Arc::new(RecordingSink::default());

        let (playback, playback_task) =
            PlaybackScheduler::spawn(sink.clone(), PlaybackConfig::default());
        let pipeline = TurnPipeline::new(
            TurnServices {
                transcriber: transcriber.clone(),
                answers: answers.clone(),
                synthesizer: synthesizer.clone(),
            },
            "bn",
            StageTimeouts::default(),
        );
        let manager = SessionManager::new(
            detector.clone(),
            pipeline,
            playback,
            SessionManagerConfig::default(),
        );
        let events = manager.subscribe();

        Self {
            manager,
            events,
            detector,
            transcriber,
            answers,
            synthesizer,
            sink,
            playback_task,
        }
    }

    /// Subscribe `identity`'s track, delivering `frames` back to back.
    pub async fn join(&self, identity: &str, frames: Vec<AudioFrame>) {
        self.manager
            .handle_event(ConferenceEvent::AudioTrackSubscribed {
                identity: identity.to_string(),
                frames: futures::stream::iter(frames).boxed(),
            })
            .await;
    }

    /// Subscribe `identity`'s track with frames fed through the returned sender.
    pub async fn join_live(&self, identity: &str) -> tokio::sync::mpsc::UnboundedSender<AudioFrame> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let frames = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        })
        .boxed();
        self.manager
            .handle_event(ConferenceEvent::AudioTrackSubscribed {
                identity: identity.to_string(),
                frames,
            })
            .await;
        tx
    }

    pub async fn leave(&self, identity: &str) {
        self.manager
            .handle_event(ConferenceEvent::ParticipantDisconnected {
                identity: identity.to_string(),
            })
            .await;
    }

    /// Next event, failing the test after a (virtual) minute.
    pub async fn next_event(&mut self) -> TurnEvent {
        tokio::time::timeout(Duration::from_secs(60), self.events.recv())
            .await
            .expect("timed out waiting for turn event")
            .expect("event channel closed")
    }

    /// Wait for the next `Finished` event, returning its participant and outcome.
    pub async fn next_finished(&mut self) -> (String, TurnOutcome) {
        loop {
            if let TurnEvent::Finished {
                participant,
                outcome,
            } = self.next_event().await
            {
                return (participant, outcome);
            }
        }
    }

    /// Wait until the playback scheduler has finished `count` payloads.
    pub async fn wait_for_playback(&self, count: u64) {
        let playback = self.manager.playback();
        tokio::time::timeout(Duration::from_secs(60), async {
            while playback.payloads_played() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for playback");
    }

    /// Let every runnable task make progress.
    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}
