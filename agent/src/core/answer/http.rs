use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::base::{AnswerError, AnswerResult, AnswerService, AnswerStream};
use super::ndjson::ndjson_events;

#[derive(Debug, Serialize)]
struct AnswerRequest<'a> {
    user_id: &'a str,
    query: &'a str,
}

#[derive(Debug, Serialize)]
struct ClearSessionRequest<'a> {
    user_id: &'a str,
}

/// Answer service reached over HTTP with a streamed NDJSON reply.
#[derive(Debug, Clone)]
pub struct HttpAnswerService {
    http_client: Client,
    url: String,
    clear_url: Option<String>,
}

impl HttpAnswerService {
    /// `timeout` bounds the whole exchange, including reading the streamed body.
    pub fn new(
        url: impl Into<String>,
        clear_url: Option<String>,
        timeout: Duration,
    ) -> AnswerResult<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(AnswerError::ConfigurationError(
                "Answer service URL is empty".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                AnswerError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            url,
            clear_url: clear_url.filter(|u| !u.is_empty()),
        })
    }
}

#[async_trait]
impl AnswerService for HttpAnswerService {
    async fn stream_answer(&self, user_id: &str, query: &str) -> AnswerResult<AnswerStream> {
        debug!(user_id, "Requesting answer for {} character query", query.len());

        let response = self
            .http_client
            .post(&self.url)
            .json(&AnswerRequest { user_id, query })
            .send()
            .await
            .map_err(|e| AnswerError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnswerError::ProviderError(format!(
                "Answer service error ({status}): {body}"
            )));
        }

        Ok(ndjson_events(response.bytes_stream()))
    }

    async fn clear_session(&self, user_id: &str) -> AnswerResult<()> {
        let Some(clear_url) = self.clear_url.as_deref() else {
            return Ok(());
        };

        let response = self
            .http_client
            .post(clear_url)
            .json(&ClearSessionRequest { user_id })
            .send()
            .await
            .map_err(|e| AnswerError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnswerError::ProviderError(format!(
                "Clear session failed ({status})"
            )));
        }

        info!(user_id, "Cleared answer session");
        Ok(())
    }
}
