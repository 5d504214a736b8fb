use std::env;
use std::str::FromStr;

use super::AgentConfig;

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name} ({raw:?}): {e}")),
        None => Ok(None),
    }
}

/// Defaults overlaid with whatever the environment sets.
pub fn load_from_env() -> Result<AgentConfig, String> {
    let mut config = AgentConfig::default();

    let livekit = &mut config.livekit;
    if let Some(v) = var("LIVEKIT_URL") {
        livekit.url = v;
    }
    if let Some(v) = var("LIVEKIT_API_KEY") {
        livekit.api_key = v;
    }
    if let Some(v) = var("LIVEKIT_API_SECRET") {
        livekit.api_secret = v;
    }
    if let Some(v) = var("ROOM_NAME") {
        livekit.room = v;
    }
    if let Some(v) = var("BOT_IDENTITY") {
        livekit.bot_identity = v;
    }
    if let Some(v) = var("BOT_NAME") {
        livekit.bot_name = v;
    }

    let services = &mut config.services;
    if let Some(v) = var("VAD_URL") {
        services.vad_url = v;
    }
    if let Some(v) = var("STT_URL") {
        services.stt_url = v;
    }
    if let Some(v) = var("TTS_URL") {
        services.tts_url = v;
    }
    if let Some(v) = var("ANSWER_URL").or_else(|| var("GOVT_API_URL")) {
        services.answer_url = v;
    }
    if let Some(v) = var("ANSWER_CLEAR_URL") {
        services.answer_clear_url = Some(v);
    }
    if let Some(v) = var("STT_LANGUAGE") {
        services.stt_language = v;
    }
    if let Some(v) = var("TTS_LANGUAGE") {
        services.tts_language = v;
    }

    let timeouts = &mut config.timeouts;
    if let Some(v) = parse_var("DETECT_TIMEOUT_MS")? {
        timeouts.detect_ms = v;
    }
    if let Some(v) = parse_var("TRANSCRIBE_TIMEOUT_MS")? {
        timeouts.transcribe_ms = v;
    }
    if let Some(v) = parse_var("ANSWER_TIMEOUT_MS")? {
        timeouts.answer_ms = v;
    }
    if let Some(v) = parse_var("SYNTHESIZE_TIMEOUT_MS")? {
        timeouts.synthesize_ms = v;
    }

    if let Some(v) = parse_var("SILENCE_DURATION_MS")? {
        config.segmenter.silence_threshold_ms = v;
    }
    if let Some(v) = parse_var("MAX_SPEECH_DURATION_MS")? {
        config.segmenter.max_speech_ms = v;
    }

    Ok(config)
}
