//! LiveKit transport adapter
//!
//! Joins the configured room as the bot, publishes the shared outbound track
//! and turns room activity into [`ConferenceEvent`](crate::core::ConferenceEvent)s
//! for the session manager.

mod room;
mod sink;

pub use room::{BOT_TRACK_NAME, INBOUND_CHANNELS, INBOUND_SAMPLE_RATE, RoomConnection};
pub use sink::LiveKitSink;

use livekit_api::access_token::{AccessToken, VideoGrants};
use thiserror::Error;

use crate::config::LiveKitConfig;
use crate::errors::OrchestratorError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LiveKitError {
    #[error("Failed to mint access token: {0}")]
    Token(String),

    #[error("Failed to connect to room: {0}")]
    Connection(String),

    #[error("Failed to publish track: {0}")]
    Publish(String),

    /// The room connection is gone
    #[error("Disconnected from room: {0}")]
    Disconnected(String),
}

pub type LiveKitResult<T> = Result<T, LiveKitError>;

impl From<LiveKitError> for OrchestratorError {
    fn from(e: LiveKitError) -> Self {
        OrchestratorError::Transport(e.to_string())
    }
}

/// Sign a room-join token for the bot identity.
pub fn bot_token(config: &LiveKitConfig) -> LiveKitResult<String> {
    AccessToken::with_api_key(&config.api_key, &config.api_secret)
        .with_identity(&config.bot_identity)
        .with_name(&config.bot_name)
        .with_grants(VideoGrants {
            room_join: true,
            room: config.room.clone(),
            can_publish: true,
            can_subscribe: true,
            ..Default::default()
        })
        .to_jwt()
        .map_err(|e| LiveKitError::Token(e.to_string()))
}
