//! Orchestrator error taxonomy
//!
//! Collaborator modules (`core::vad`, `core::stt`, `core::answer`, `core::tts`)
//! define their own error enums. This module defines the errors the
//! orchestration core reasons about: what a failure *means* for a frame, a
//! turn or a session, independent of which collaborator produced it.
//!
//! | Error | Effect |
//! |---|---|
//! | `InvalidFrame` | frame dropped, session continues |
//! | `DetectorUnavailable` | frame treated as non-speech, session continues |
//! | `TranscriptionEmpty` | turn abandoned, no playback |
//! | `UpstreamFailure` | turn abandoned, no playback |
//! | `PlaybackDecodeFailure` | playback of that turn dropped |
//! | `Transport` | session-fatal, triggers teardown |

use std::fmt;

use thiserror::Error;

/// Sequential stages of a conversation turn that call out to a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnStage {
    Transcribe,
    Answer,
    Synthesize,
}

impl TurnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStage::Transcribe => "transcribe",
            TurnStage::Answer => "answer",
            TurnStage::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors handled by the orchestration core.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrchestratorError {
    /// Malformed inbound audio frame
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Speech-activity classification call failed or timed out
    #[error("Speech detector unavailable: {0}")]
    DetectorUnavailable(String),

    /// Transcription produced no usable text
    #[error("Transcription was empty")]
    TranscriptionEmpty,

    /// A collaborator stage failed or timed out
    #[error("Upstream failure at {stage}: {detail}")]
    UpstreamFailure { stage: TurnStage, detail: String },

    /// Synthesized payload could not be decoded for playback
    #[error("Playback decode failure: {0}")]
    PlaybackDecodeFailure(String),

    /// Conferencing transport failure; fatal for the affected session(s)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OrchestratorError {
    pub fn upstream(stage: TurnStage, detail: impl Into<String>) -> Self {
        OrchestratorError::UpstreamFailure {
            stage,
            detail: detail.into(),
        }
    }

    /// Whether the error requires tearing the session down.
    ///
    /// Only transport-level failures are fatal; everything else is absorbed
    /// within the frame or turn that produced it.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, OrchestratorError::Transport(_))
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
