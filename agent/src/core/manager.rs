//! Session lifecycle.
//!
//! [`SessionManager`] owns the live set of participant sessions and is driven
//! by explicit [`ConferenceEvent`]s from the transport adapter. It is the only
//! place sessions are created or destroyed.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::audio::AudioFrame;
use crate::core::pipeline::TurnPipeline;
use crate::core::playback::PlaybackHandle;
use crate::core::segmenter::SegmenterConfig;
use crate::core::session::{ParticipantSession, SessionContext, TurnEvent};
use crate::core::vad::SpeechDetector;

/// Inbound audio of one participant track.
pub type FrameStream = BoxStream<'static, AudioFrame>;

/// Room activity relevant to session management.
pub enum ConferenceEvent {
    ParticipantConnected { identity: String },
    AudioTrackSubscribed { identity: String, frames: FrameStream },
    ParticipantDisconnected { identity: String },
}

impl std::fmt::Debug for ConferenceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConferenceEvent::ParticipantConnected { identity } => {
                f.debug_struct("ParticipantConnected").field("identity", identity).finish()
            }
            ConferenceEvent::AudioTrackSubscribed { identity, .. } => {
                f.debug_struct("AudioTrackSubscribed").field("identity", identity).finish()
            }
            ConferenceEvent::ParticipantDisconnected { identity } => f
                .debug_struct("ParticipantDisconnected")
                .field("identity", identity)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Identity the agent itself joins with; never gets a session
    pub bot_identity: String,
    pub segmenter: SegmenterConfig,
    pub detect_timeout: Duration,
    /// Bound on the best-effort answer-history clear at departure
    pub clear_timeout: Duration,
    pub event_capacity: usize,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            bot_identity: "bangla-bot".to_string(),
            segmenter: SegmenterConfig::default(),
            detect_timeout: Duration::from_secs(2),
            clear_timeout: Duration::from_secs(60),
            event_capacity: 64,
        }
    }
}

struct SessionHandle {
    session: Arc<ParticipantSession>,
    frame_loop: JoinHandle<()>,
}

pub struct SessionManager {
    ctx: Arc<SessionContext>,
    sessions: DashMap<String, SessionHandle>,
    bot_identity: String,
    clear_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        detector: Arc<dyn SpeechDetector>,
        pipeline: TurnPipeline,
        playback: PlaybackHandle,
        config: SessionManagerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let ctx = SessionContext {
            detector,
            pipeline,
            playback,
            segmenter: config.segmenter,
            detect_timeout: config.detect_timeout,
            events,
        };

        Self {
            ctx: Arc::new(ctx),
            sessions: DashMap::new(),
            bot_identity: config.bot_identity,
            clear_timeout: config.clear_timeout,
        }
    }

    /// Receive turn lifecycle events from every session.
    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.ctx.events.subscribe()
    }

    pub fn playback(&self) -> &PlaybackHandle {
        &self.ctx.playback
    }

    pub fn session(&self, identity: &str) -> Option<Arc<ParticipantSession>> {
        self.sessions.get(identity).map(|h| h.session.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn identities(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub async fn handle_event(&self, event: ConferenceEvent) {
        match event {
            ConferenceEvent::ParticipantConnected { identity } => {
                info!(participant = %identity, "Participant connected");
            }
            ConferenceEvent::AudioTrackSubscribed { identity, frames } => {
                self.start_session(identity, frames).await;
            }
            ConferenceEvent::ParticipantDisconnected { identity } => {
                info!(participant = %identity, "Participant disconnected");
                self.end_session(&identity).await;
            }
        }
    }

    /// Create a session for `identity` and start its frame loop.
    ///
    /// Returns false when nothing was started: the identity is the bot's own,
    /// or a live session already exists.
    pub async fn start_session(&self, identity: String, frames: FrameStream) -> bool {
        if identity == self.bot_identity {
            debug!(participant = %identity, "Ignoring agent's own track");
            return false;
        }

        let stale = match self.sessions.get(&identity) {
            Some(handle) if !handle.frame_loop.is_finished() => {
                debug!(participant = %identity, "Session already running");
                return false;
            }
            Some(_) => true,
            None => false,
        };
        if stale {
            info!(participant = %identity, "Replacing stale session");
            self.remove_session(&identity).await;
        }

        match self.sessions.entry(identity.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let session = ParticipantSession::new(identity.clone(), self.ctx.clone());
                let frame_loop = tokio::spawn(session.clone().run(frames));
                slot.insert(SessionHandle {
                    session,
                    frame_loop,
                });
                info!(participant = %identity, "Session started");
                true
            }
        }
    }

    /// Tear down the session for `identity`, then clear its answer history
    /// on a background task.
    ///
    /// Returns once the session is gone; the clear never holds up the
    /// caller's event loop.
    pub async fn end_session(&self, identity: &str) -> bool {
        if !self.remove_session(identity).await {
            return false;
        }

        let answers = self.ctx.pipeline.services().answers.clone();
        let identity = identity.to_string();
        let limit = self.clear_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(limit, answers.clear_session(&identity)).await {
                Ok(Ok(())) => debug!(participant = %identity, "Answer session cleared"),
                Ok(Err(e)) => {
                    warn!(participant = %identity, error = %e, "Failed to clear answer session")
                }
                Err(_) => warn!(participant = %identity, "Clearing answer session timed out"),
            }
        });
        true
    }

    /// Tear down every session.
    pub async fn shutdown_all(&self) {
        let identities = self.identities();
        info!(sessions = identities.len(), "Closing all sessions");
        for identity in identities {
            self.remove_session(&identity).await;
        }
    }

    async fn remove_session(&self, identity: &str) -> bool {
        let Some((_, handle)) = self.sessions.remove(identity) else {
            return false;
        };

        handle.session.close().await;
        if let Err(e) = handle.frame_loop.await {
            warn!(participant = %identity, error = %e, "Frame loop task failed");
        }
        info!(participant = %identity, "Session closed");
        true
    }
}
