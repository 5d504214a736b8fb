use async_trait::async_trait;
use thiserror::Error;

use crate::core::segmenter::Utterance;

/// Transcriber errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum STTError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type STTResult<T> = Result<T, STTError>;

/// Converts an utterance into text.
///
/// An empty or whitespace-only string is a valid answer meaning "nothing
/// intelligible was said"; callers decide what to do with it.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, utterance: &Utterance) -> STTResult<String>;
}
