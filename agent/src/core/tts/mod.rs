//! Speech-synthesis collaborator

mod base;
mod http;

pub use base::{Synthesizer, TTSError, TTSResult};
pub use http::HttpSynthesizer;
