use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration; anything left out
/// keeps its environment or default value.
///
/// # Example YAML structure
/// ```yaml
/// livekit:
///   url: "ws://localhost:7880"
///   api_key: "devkey"
///   api_secret: "secret"
///   room: "bangla-voice-agent"
///   bot_identity: "bangla-bot"
///   bot_name: "Bangla AI Agent"
///
/// services:
///   vad_url: "http://vad:8000/detect_speech"
///   stt_url: "http://stt:8001/transcribe"
///   tts_url: "http://tts:8002/synthesize"
///   answer_url: "http://answers/chat/stream"
///   answer_clear_url: "http://answers/chat/clear_session"
///   stt_language: "bengali"
///   tts_language: "bn"
///
/// timeouts:
///   detect_ms: 2000
///   transcribe_ms: 30000
///   answer_ms: 60000
///   synthesize_ms: 30000
///
/// segmenter:
///   frame_ms: 30
///   sample_rate: 16000
///   silence_threshold_ms: 700
///   max_speech_ms: 20000
///
/// playback:
///   sample_rate: 48000
///   channels: 1
///   frame_ms: 20
///   pacing_factor: 0.95
///   queue_depth: 16
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub livekit: Option<LiveKitYaml>,
    pub services: Option<ServicesYaml>,
    pub timeouts: Option<TimeoutsYaml>,
    pub segmenter: Option<SegmenterYaml>,
    pub playback: Option<PlaybackYaml>,
}

/// LiveKit configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LiveKitYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub room: Option<String>,
    pub bot_identity: Option<String>,
    pub bot_name: Option<String>,
}

/// Collaborator endpoints from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServicesYaml {
    pub vad_url: Option<String>,
    pub stt_url: Option<String>,
    pub tts_url: Option<String>,
    pub answer_url: Option<String>,
    pub answer_clear_url: Option<String>,
    pub stt_language: Option<String>,
    pub tts_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TimeoutsYaml {
    pub detect_ms: Option<u64>,
    pub transcribe_ms: Option<u64>,
    pub answer_ms: Option<u64>,
    pub synthesize_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SegmenterYaml {
    pub frame_ms: Option<u32>,
    pub sample_rate: Option<u32>,
    pub silence_threshold_ms: Option<u32>,
    pub max_speech_ms: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PlaybackYaml {
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub frame_ms: Option<u32>,
    pub pacing_factor: Option<f64>,
    pub queue_depth: Option<usize>,
}

impl YamlConfig {
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
