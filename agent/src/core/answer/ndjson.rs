use std::fmt::Display;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use super::base::{AnswerError, AnswerEvent, AnswerStream};

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: serde_json::Value,
}

fn content_text(content: serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_line(line: &[u8]) -> Option<AnswerEvent> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let raw: RawEvent = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Skipping undecodable answer line: {e}");
            return None;
        }
    };

    match raw.kind.as_str() {
        "answer_chunk" => Some(AnswerEvent::Chunk(content_text(raw.content))),
        "final_data" => Some(AnswerEvent::FinalData(raw.content)),
        "error" => Some(AnswerEvent::Error(content_text(raw.content))),
        other => {
            debug!("Ignoring answer event of type {other}");
            None
        }
    }
}

struct LineState<S> {
    body: std::pin::Pin<Box<S>>,
    buffer: Vec<u8>,
    exhausted: bool,
}

/// Split a chunked byte stream into answer events, one JSON object per line.
///
/// Lines may span chunk boundaries. A trailing line without a newline is
/// still parsed once the body ends. A transport error ends the stream after
/// being yielded.
pub fn ndjson_events<S, E>(body: S) -> AnswerStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = LineState {
        body: Box::pin(body),
        buffer: Vec::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                if let Some(event) = parse_line(&line) {
                    return Some((Ok(event), state));
                }
                continue;
            }

            if state.exhausted {
                if state.buffer.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut state.buffer);
                return parse_line(&line).map(|event| (Ok(event), state));
            }

            match state.body.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.exhausted = true;
                    state.buffer.clear();
                    return Some((
                        Err(AnswerError::NetworkError(format!("Answer stream failed: {e}"))),
                        state,
                    ));
                }
                None => state.exhausted = true,
            }
        }
    })
    .boxed()
}
