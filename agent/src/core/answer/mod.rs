//! Answer-generation collaborator
//!
//! The answer service streams its reply as newline-delimited JSON events:
//!
//! ```text
//! {"type": "answer_chunk", "content": "..."}
//! {"type": "final_data", "content": {"sources": [...]}}
//! {"type": "error", "content": "..."}
//! ```
//!
//! Only `answer_chunk` content contributes to the spoken answer. `final_data`
//! carries citations that voice output has no use for, and `error` aborts the
//! turn.

mod base;
mod http;
mod ndjson;

pub use base::{AnswerError, AnswerEvent, AnswerResult, AnswerService, AnswerStream, collect_answer};
pub use http::HttpAnswerService;
pub use ndjson::ndjson_events;
