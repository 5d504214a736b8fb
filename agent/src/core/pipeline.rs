//! Turn pipeline: transcription, answer generation and synthesis.
//!
//! Stages run strictly in sequence, each bounded by its own timeout. The
//! first failure or empty result ends the turn; a timed-out stage counts as
//! a failed one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::core::answer::{AnswerService, collect_answer};
use crate::core::segmenter::Utterance;
use crate::core::stt::Transcriber;
use crate::core::tts::Synthesizer;
use crate::errors::{OrchestratorError, TurnStage};

/// Result of one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnResult {
    /// Synthesized answer audio, ready for playback
    Answered(Bytes),
    /// The utterance carried no audio
    NoSpeech,
    /// Nothing intelligible was transcribed
    TranscriptionEmpty,
    UpstreamFailure { stage: TurnStage, detail: String },
}

impl TurnResult {
    fn upstream(stage: TurnStage, detail: impl Into<String>) -> Self {
        TurnResult::UpstreamFailure {
            stage,
            detail: detail.into(),
        }
    }

    /// The absorbed error this result stands for, if any.
    pub fn error(&self) -> Option<OrchestratorError> {
        match self {
            TurnResult::Answered(_) | TurnResult::NoSpeech => None,
            TurnResult::TranscriptionEmpty => Some(OrchestratorError::TranscriptionEmpty),
            TurnResult::UpstreamFailure { stage, detail } => {
                Some(OrchestratorError::upstream(*stage, detail.clone()))
            }
        }
    }
}

/// Per-stage deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub transcribe: Duration,
    pub answer: Duration,
    pub synthesize: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            transcribe: Duration::from_secs(30),
            answer: Duration::from_secs(60),
            synthesize: Duration::from_secs(30),
        }
    }
}

/// The three inference collaborators a turn talks to.
#[derive(Clone)]
pub struct TurnServices {
    pub transcriber: Arc<dyn Transcriber>,
    pub answers: Arc<dyn AnswerService>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

#[derive(Clone)]
pub struct TurnPipeline {
    services: TurnServices,
    language: String,
    timeouts: StageTimeouts,
}

impl TurnPipeline {
    pub fn new(services: TurnServices, language: impl Into<String>, timeouts: StageTimeouts) -> Self {
        Self {
            services,
            language: language.into(),
            timeouts,
        }
    }

    pub fn services(&self) -> &TurnServices {
        &self.services
    }

    /// Run one turn for `participant`.
    ///
    /// The caller holds the participant's turn lock for the duration of the
    /// call. The utterance is consumed and dropped once transcription is done.
    pub async fn run_turn(&self, participant: &str, utterance: Utterance) -> TurnResult {
        if utterance.is_empty() {
            return TurnResult::NoSpeech;
        }

        let text = {
            let utterance = utterance;
            match bounded(
                TurnStage::Transcribe,
                self.timeouts.transcribe,
                self.services.transcriber.transcribe(&utterance),
            )
            .await
            {
                Ok(text) => text,
                Err(result) => return result,
            }
        };

        let query = text.trim();
        if query.is_empty() {
            debug!(participant, "Transcription empty, abandoning turn");
            return TurnResult::TranscriptionEmpty;
        }
        info!(participant, query, "User said");

        let answer = match bounded(TurnStage::Answer, self.timeouts.answer, async {
            let events = self.services.answers.stream_answer(participant, query).await?;
            collect_answer(events).await
        })
        .await
        {
            Ok(answer) => answer,
            Err(result) => return result,
        };

        let answer = answer.trim();
        if answer.is_empty() {
            warn!(participant, "Answer service returned no content");
            return TurnResult::upstream(TurnStage::Answer, "empty answer");
        }
        info!(participant, answer, "Answering");

        match bounded(
            TurnStage::Synthesize,
            self.timeouts.synthesize,
            self.services.synthesizer.synthesize(answer, &self.language),
        )
        .await
        {
            Ok(audio) => TurnResult::Answered(audio),
            Err(result) => result,
        }
    }
}

/// Await `stage` within `limit`, mapping failures and timeouts to a
/// ready-made `UpstreamFailure`.
async fn bounded<T, E, F>(stage: TurnStage, limit: Duration, fut: F) -> Result<T, TurnResult>
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!(%stage, error = %e, "Turn stage failed");
            Err(TurnResult::upstream(stage, e.to_string()))
        }
        Err(_) => {
            warn!(%stage, timeout_ms = limit.as_millis() as u64, "Turn stage timed out");
            Err(TurnResult::upstream(
                stage,
                format!("timed out after {} ms", limit.as_millis()),
            ))
        }
    }
}
