//! Transcription collaborator
//!
//! Turns a buffered utterance into text. The HTTP client wraps the raw
//! 16 kHz mono PCM in a WAV envelope and posts it as a multipart upload
//! with a language hint.

mod base;
mod http;

pub use base::{STTError, STTResult, Transcriber};
pub use http::HttpTranscriber;
