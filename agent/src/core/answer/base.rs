use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use thiserror::Error;

/// One event of a streamed answer.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    /// A piece of answer text, concatenated in arrival order
    Chunk(String),
    /// Terminal sideband payload (citations); not part of the spoken answer
    FinalData(serde_json::Value),
    /// The service gave up mid-answer
    Error(String),
}

/// Answer service errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnswerError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    /// An `error` event arrived in the answer stream
    #[error("Answer stream error: {0}")]
    StreamError(String),
}

pub type AnswerResult<T> = Result<T, AnswerError>;

/// Lazy, finite, non-restartable sequence of answer events.
pub type AnswerStream = BoxStream<'static, AnswerResult<AnswerEvent>>;

#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Start answering `query` on behalf of `user_id`.
    async fn stream_answer(&self, user_id: &str, query: &str) -> AnswerResult<AnswerStream>;

    /// Forget the conversation history kept for `user_id`.
    async fn clear_session(&self, _user_id: &str) -> AnswerResult<()> {
        Ok(())
    }
}

/// Fold an answer stream into the full answer text.
///
/// Stops at the first `error` event or transport error.
pub async fn collect_answer(mut events: AnswerStream) -> AnswerResult<String> {
    let mut answer = String::new();
    while let Some(event) = events.next().await {
        match event? {
            AnswerEvent::Chunk(text) => answer.push_str(&text),
            AnswerEvent::FinalData(_) => {}
            AnswerEvent::Error(message) => return Err(AnswerError::StreamError(message)),
        }
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn events(items: Vec<AnswerResult<AnswerEvent>>) -> AnswerStream {
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn test_collect_concatenates_chunks_and_ignores_final_data() {
        let answer = collect_answer(events(vec![
            Ok(AnswerEvent::Chunk("Hello".into())),
            Ok(AnswerEvent::Chunk(", ".into())),
            Ok(AnswerEvent::FinalData(serde_json::json!({"sources": ["a"]}))),
            Ok(AnswerEvent::Chunk("world".into())),
        ]))
        .await
        .unwrap();
        assert_eq!(answer, "Hello, world");
    }

    #[tokio::test]
    async fn test_collect_aborts_on_error_event() {
        let result = collect_answer(events(vec![
            Ok(AnswerEvent::Chunk("partial".into())),
            Ok(AnswerEvent::Error("backend exploded".into())),
            Ok(AnswerEvent::Chunk("never".into())),
        ]))
        .await;
        assert_eq!(
            result,
            Err(AnswerError::StreamError("backend exploded".into()))
        );
    }

    #[tokio::test]
    async fn test_collect_propagates_transport_error() {
        let result = collect_answer(events(vec![
            Ok(AnswerEvent::Chunk("partial".into())),
            Err(AnswerError::NetworkError("reset".into())),
        ]))
        .await;
        assert!(matches!(result, Err(AnswerError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_collect_empty_stream() {
        assert_eq!(collect_answer(events(vec![])).await.unwrap(), "");
    }
}
