use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use super::base::{STTError, STTResult, Transcriber};
use crate::core::audio::{bytes_to_samples, codec};
use crate::core::segmenter::Utterance;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(alias = "transcription")]
    text: String,
}

/// Transcriber backed by an HTTP service taking multipart WAV uploads.
#[derive(Debug, Clone)]
pub struct HttpTranscriber {
    http_client: Client,
    url: String,
    language: String,
}

impl HttpTranscriber {
    pub fn new(
        url: impl Into<String>,
        language: impl Into<String>,
        timeout: Duration,
    ) -> STTResult<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(STTError::ConfigurationError(
                "Transcriber URL is empty".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                STTError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            url,
            language: language.into(),
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, utterance: &Utterance) -> STTResult<String> {
        let samples = bytes_to_samples(&utterance.audio);
        let wav_data = codec::encode_wav(&samples, utterance.sample_rate, 1)
            .map_err(|e| STTError::AudioProcessingError(e.to_string()))?;

        info!(
            "Sending {} bytes of audio ({} ms) to transcriber",
            wav_data.len(),
            utterance.duration().as_millis()
        );

        let file_part = Part::bytes(wav_data)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| STTError::ConfigurationError(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new().part("file", file_part);
        if !self.language.is_empty() {
            form = form.text("language", self.language.clone());
        }

        let response = self
            .http_client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| STTError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| STTError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(STTError::ProviderError(format!(
                "Transcriber error ({status}): {response_text}"
            )));
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&response_text)
            .map_err(|e| STTError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        debug!("Transcription complete: {} characters", parsed.text.len());
        Ok(parsed.text)
    }
}
