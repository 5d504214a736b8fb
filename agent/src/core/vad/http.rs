use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::trace;

use super::base::{Detection, SpeechDetector, VADError, VADResult};
use crate::core::audio::AudioFrame;

/// Detector backed by an HTTP service taking raw PCM bodies.
#[derive(Debug, Clone)]
pub struct HttpSpeechDetector {
    http_client: Client,
    url: String,
}

impl HttpSpeechDetector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> VADResult<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(VADError::ConfigurationError(
                "Detector URL is empty".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| {
                VADError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { http_client, url })
    }
}

#[async_trait]
impl SpeechDetector for HttpSpeechDetector {
    async fn detect(&self, frame: &AudioFrame) -> VADResult<Detection> {
        let response = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/octet-stream")
            .body(frame.to_le_bytes())
            .send()
            .await
            .map_err(|e| VADError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VADError::ProviderError(format!(
                "Detector returned {status}: {body}"
            )));
        }

        let detection = response
            .json::<Detection>()
            .await
            .map_err(|e| VADError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        trace!(
            is_speech = detection.is_speech,
            confidence = detection.confidence,
            "Frame classified"
        );
        Ok(detection)
    }
}
