use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::audio::AudioFrame;

/// Classification result for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub is_speech: bool,
    #[serde(default)]
    pub confidence: f32,
}

impl Detection {
    pub fn speech(confidence: f32) -> Self {
        Self {
            is_speech: true,
            confidence,
        }
    }

    pub fn silence() -> Self {
        Self {
            is_speech: false,
            confidence: 0.0,
        }
    }
}

/// Speech detector errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VADError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type VADResult<T> = Result<T, VADError>;

/// Classifies normalized frames as speech or non-speech.
///
/// Implementations must be cheap to share across sessions; the same detector
/// instance is called concurrently by every participant's frame loop.
#[async_trait]
pub trait SpeechDetector: Send + Sync {
    async fn detect(&self, frame: &AudioFrame) -> VADResult<Detection>;
}
