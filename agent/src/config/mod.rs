//! Configuration module for the voice agent
//!
//! Configuration comes from .env files, environment variables and YAML files.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voice_agent::config::AgentConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = AgentConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = AgentConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Joining room {}", config.livekit.room);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::{PlaybackConfig, SegmenterConfig, StageTimeouts};

/// LiveKit connection and bot identity
#[derive(Debug, Clone, PartialEq)]
pub struct LiveKitConfig {
    /// Server URL (ws:// or wss://)
    pub url: String,
    pub api_key: String,
    /// Used to sign the bot's access token; zeroized on drop
    pub api_secret: String,
    /// Room the bot joins
    pub room: String,
    /// Identity the bot joins with; never treated as a participant
    pub bot_identity: String,
    /// Display name of the bot
    pub bot_name: String,
}

impl Drop for LiveKitConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        self.api_key.zeroize();
        self.api_secret.zeroize();
    }
}

/// Inference collaborator endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct ServicesConfig {
    /// Speech-activity detector (raw PCM in, `{is_speech, confidence}` out)
    pub vad_url: String,
    /// Transcriber (multipart WAV in, `{transcription}` out)
    pub stt_url: String,
    /// Synthesizer (`{text, lang}` in, MP3 out)
    pub tts_url: String,
    /// Answer service (`{user_id, query}` in, NDJSON events out)
    pub answer_url: String,
    /// Clears a participant's answer history on departure when set
    pub answer_clear_url: Option<String>,
    /// Language hint sent with every transcription
    pub stt_language: String,
    /// Language code sent with every synthesis
    pub tts_language: String,
}

/// Per-call deadlines for the collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub detect_ms: u64,
    pub transcribe_ms: u64,
    pub answer_ms: u64,
    pub synthesize_ms: u64,
}

impl TimeoutConfig {
    pub fn detect(&self) -> Duration {
        Duration::from_millis(self.detect_ms)
    }

    pub fn stages(&self) -> StageTimeouts {
        StageTimeouts {
            transcribe: Duration::from_millis(self.transcribe_ms),
            answer: Duration::from_millis(self.answer_ms),
            synthesize: Duration::from_millis(self.synthesize_ms),
        }
    }
}

/// Agent configuration
///
/// Everything needed to join a room and run conversations:
/// - LiveKit connection and bot identity
/// - Collaborator endpoints and language hints
/// - Collaborator timeouts
/// - Speech segmentation thresholds
/// - Outbound playback format and pacing
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub livekit: LiveKitConfig,
    pub services: ServicesConfig,
    pub timeouts: TimeoutConfig,
    pub segmenter: SegmenterConfig,
    pub playback: PlaybackConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            livekit: LiveKitConfig {
                url: "ws://localhost:7880".to_string(),
                api_key: "devkey".to_string(),
                api_secret: "secret".to_string(),
                room: "bangla-voice-agent".to_string(),
                bot_identity: "bangla-bot".to_string(),
                bot_name: "Bangla AI Agent".to_string(),
            },
            services: ServicesConfig {
                vad_url: "http://vad:8000/detect_speech".to_string(),
                stt_url: "http://stt:8001/transcribe".to_string(),
                tts_url: "http://tts:8002/synthesize".to_string(),
                answer_url: "http://114.130.116.74/govtchat/chat/stream".to_string(),
                answer_clear_url: None,
                stt_language: "bengali".to_string(),
                tts_language: "bn".to_string(),
            },
            timeouts: TimeoutConfig {
                detect_ms: 2_000,
                transcribe_ms: 30_000,
                answer_ms: 60_000,
                synthesize_ms: 30_000,
            },
            segmenter: SegmenterConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded in main.rs before this is called, so actual
    /// environment variables override .env values, which override defaults.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// `(service, url)` pairs of the collaborators that expose `/health`.
    ///
    /// The answer service has no health endpoint and is not probed.
    pub fn health_targets(&self) -> [(&str, &str); 3] {
        [
            ("vad", self.services.vad_url.as_str()),
            ("stt", self.services.stt_url.as_str()),
            ("tts", self.services.tts_url.as_str()),
        ]
    }
}
