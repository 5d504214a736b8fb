//! Orchestration core.
//!
//! Inbound frames flow through [`session::ParticipantSession`]:
//! resampling ([`audio`]), speech detection ([`vad`]) and segmentation
//! ([`segmenter`]); finished utterances run through the [`pipeline`]
//! (transcription, answer, synthesis) and the resulting audio is serialized
//! onto the shared outbound track by the [`playback`] scheduler.
//! [`manager::SessionManager`] owns the sessions.

pub mod answer;
pub mod audio;
pub mod health;
pub mod manager;
pub mod pipeline;
pub mod playback;
pub mod segmenter;
pub mod session;
pub mod stt;
pub mod tts;
pub mod vad;

pub use manager::{ConferenceEvent, FrameStream, SessionManager, SessionManagerConfig};
pub use pipeline::{StageTimeouts, TurnPipeline, TurnResult, TurnServices};
pub use playback::{
    AudioSink, PlaybackConfig, PlaybackError, PlaybackHandle, PlaybackRequest, PlaybackScheduler,
    TransportError,
};
pub use segmenter::{SegmenterConfig, SpeechSegmenter, SpeechState, TurnTrigger, Utterance};
pub use session::{ParticipantSession, SessionCounters, TurnEvent, TurnOutcome};
