//! Speech-activity detection collaborator
//!
//! The detector classifies one normalized 30 ms frame (mono 16 kHz 16-bit PCM)
//! as speech or non-speech. Classification runs out of process; this module
//! holds the consumed contract and its HTTP client.

mod base;
mod http;

pub use base::{Detection, SpeechDetector, VADError, VADResult};
pub use http::HttpSpeechDetector;
