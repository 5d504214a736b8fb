use std::borrow::Cow;

use async_trait::async_trait;
use livekit::webrtc::audio_frame::AudioFrame as RtcAudioFrame;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource};

use crate::core::audio::AudioFrame;
use crate::core::playback::{AudioSink, PlaybackConfig, TransportError};

/// Buffered audio the native source holds ahead of the network, in ms
const SOURCE_QUEUE_MS: u32 = 1000;

/// The bot's published audio source.
#[derive(Clone)]
pub struct LiveKitSink {
    source: NativeAudioSource,
}

impl LiveKitSink {
    pub fn new(playback: &PlaybackConfig) -> Self {
        let source = NativeAudioSource::new(
            AudioSourceOptions::default(),
            playback.sample_rate,
            playback.channels,
            SOURCE_QUEUE_MS,
        );
        Self { source }
    }

    pub fn rtc_source(&self) -> RtcAudioSource {
        RtcAudioSource::Native(self.source.clone())
    }
}

#[async_trait]
impl AudioSink for LiveKitSink {
    async fn capture_frame(&self, frame: AudioFrame) -> Result<(), TransportError> {
        let rtc_frame = RtcAudioFrame {
            data: Cow::Owned(frame.data),
            sample_rate: frame.sample_rate,
            num_channels: frame.num_channels,
            samples_per_channel: frame.samples_per_channel,
        };
        self.source
            .capture_frame(&rtc_frame)
            .await
            .map_err(|e| TransportError::CaptureFailed(e.to_string()))
    }
}
