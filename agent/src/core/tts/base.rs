use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Synthesizer errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TTSError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),
}

pub type TTSResult<T> = Result<T, TTSError>;

/// Renders text as a compressed audio payload (MP3 or WAV).
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> TTSResult<Bytes>;
}
