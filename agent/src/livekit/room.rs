use std::sync::Arc;

use futures::StreamExt;
use livekit::options::TrackPublishOptions;
use livekit::prelude::*;
use livekit::webrtc::audio_stream::native::NativeAudioStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::sink::LiveKitSink;
use super::{LiveKitError, LiveKitResult, bot_token};
use crate::config::LiveKitConfig;
use crate::core::audio::AudioFrame;
use crate::core::manager::{ConferenceEvent, SessionManager};
use crate::core::playback::PlaybackConfig;

/// Name of the bot's single outbound track
pub const BOT_TRACK_NAME: &str = "bot-response-track";

/// Layout inbound participant audio is requested in
pub const INBOUND_SAMPLE_RATE: u32 = 48000;
pub const INBOUND_CHANNELS: u32 = 2;

/// A joined room with the bot's track published.
pub struct RoomConnection {
    room: Room,
    events: UnboundedReceiver<RoomEvent>,
    sink: Arc<LiveKitSink>,
}

impl RoomConnection {
    /// Join the room as the bot and publish the outbound track.
    pub async fn connect(config: &LiveKitConfig, playback: &PlaybackConfig) -> LiveKitResult<Self> {
        let token = bot_token(config)?;

        info!(url = %config.url, room = %config.room, identity = %config.bot_identity, "Connecting to LiveKit");
        let (room, events) = Room::connect(&config.url, &token, RoomOptions::default())
            .await
            .map_err(|e| LiveKitError::Connection(e.to_string()))?;

        let sink = Arc::new(LiveKitSink::new(playback));
        let track = LocalAudioTrack::create_audio_track(BOT_TRACK_NAME, sink.rtc_source());
        room.local_participant()
            .publish_track(
                LocalTrack::Audio(track),
                TrackPublishOptions {
                    source: TrackSource::Microphone,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| LiveKitError::Publish(e.to_string()))?;

        info!(room = %config.room, track = BOT_TRACK_NAME, "Joined room and published track");
        Ok(Self { room, events, sink })
    }

    /// Outbound sink for the playback scheduler.
    pub fn sink(&self) -> Arc<LiveKitSink> {
        self.sink.clone()
    }

    /// Dispatch room events to `manager` until `shutdown` fires or the room
    /// connection is lost. Every session is torn down on the way out.
    pub async fn run(mut self, manager: &SessionManager, shutdown: CancellationToken) -> LiveKitResult<()> {
        let result = loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                event = self.events.recv() => event,
            };

            match event {
                None => break Err(LiveKitError::Disconnected("room event stream closed".to_string())),
                Some(RoomEvent::Disconnected { reason }) => {
                    break Err(LiveKitError::Disconnected(format!("{reason:?}")));
                }
                Some(event) => {
                    if let Some(event) = translate(event) {
                        manager.handle_event(event).await;
                    }
                }
            }
        };

        if let Err(e) = &result {
            error!(error = %e, "Room connection lost, closing all sessions");
        }
        manager.shutdown_all().await;

        if let Err(e) = self.room.close().await {
            warn!(error = %e, "Failed to close room cleanly");
        }
        result
    }
}

fn translate(event: RoomEvent) -> Option<ConferenceEvent> {
    match event {
        RoomEvent::ParticipantConnected(participant) => Some(ConferenceEvent::ParticipantConnected {
            identity: participant.identity().as_str().to_owned(),
        }),
        RoomEvent::ParticipantDisconnected(participant) => {
            Some(ConferenceEvent::ParticipantDisconnected {
                identity: participant.identity().as_str().to_owned(),
            })
        }
        RoomEvent::TrackSubscribed {
            track, participant, ..
        } => match track {
            RemoteTrack::Audio(audio) => {
                let identity = participant.identity().as_str().to_owned();
                debug!(participant = %identity, "Subscribed to audio track");
                let stream = NativeAudioStream::new(
                    audio.rtc_track(),
                    INBOUND_SAMPLE_RATE as i32,
                    INBOUND_CHANNELS as i32,
                );
                let frames = stream
                    .map(|frame| AudioFrame {
                        data: frame.data.into_owned(),
                        sample_rate: frame.sample_rate,
                        num_channels: frame.num_channels,
                        samples_per_channel: frame.samples_per_channel,
                    })
                    .boxed();
                Some(ConferenceEvent::AudioTrackSubscribed { identity, frames })
            }
            _ => None,
        },
        _ => None,
    }
}
