use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::base::{Synthesizer, TTSError, TTSResult};

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    lang: &'a str,
}

/// Synthesizer reached over HTTP; the response body is the audio payload.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    http_client: Client,
    url: String,
}

impl HttpSynthesizer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> TTSResult<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Synthesizer URL is empty".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                TTSError::InvalidConfiguration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { http_client, url })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> TTSResult<Bytes> {
        if text.trim().is_empty() {
            return Err(TTSError::AudioGenerationFailed(
                "Text must not be empty".to_string(),
            ));
        }

        let response = self
            .http_client
            .post(&self.url)
            .json(&SynthesisRequest {
                text,
                lang: language,
            })
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TTSError::ProviderError(format!(
                "Synthesizer error ({status}): {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Failed to read audio: {e}")))?;

        if audio.is_empty() {
            return Err(TTSError::AudioGenerationFailed(
                "Synthesizer returned no audio".to_string(),
            ));
        }

        debug!("Synthesized {} characters into {} bytes", text.len(), audio.len());
        Ok(audio)
    }
}
