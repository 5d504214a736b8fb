use super::AgentConfig;

/// Reject configurations the agent cannot run with.
pub fn validate(config: &AgentConfig) -> Result<(), String> {
    if config.livekit.url.trim().is_empty() {
        return Err("livekit.url must not be empty".to_string());
    }
    if config.livekit.room.trim().is_empty() {
        return Err("livekit.room must not be empty".to_string());
    }
    if config.livekit.bot_identity.trim().is_empty() {
        return Err("livekit.bot_identity must not be empty".to_string());
    }

    let services = &config.services;
    for (service, url) in [
        ("vad", &services.vad_url),
        ("stt", &services.stt_url),
        ("answer", &services.answer_url),
        ("tts", &services.tts_url),
    ] {
        if url.trim().is_empty() {
            return Err(format!("services.{service}_url must not be empty"));
        }
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("detect_ms", timeouts.detect_ms),
        ("transcribe_ms", timeouts.transcribe_ms),
        ("answer_ms", timeouts.answer_ms),
        ("synthesize_ms", timeouts.synthesize_ms),
    ] {
        if value == 0 {
            return Err(format!("timeouts.{name} must be greater than 0"));
        }
    }

    let segmenter = &config.segmenter;
    if segmenter.sample_rate == 0 || segmenter.frame_ms == 0 {
        return Err("segmenter.sample_rate and segmenter.frame_ms must be greater than 0".to_string());
    }
    if segmenter.frame_samples() == 0 {
        return Err("segmenter frames must hold at least one sample".to_string());
    }
    if segmenter.silence_threshold_ms < segmenter.frame_ms {
        return Err(format!(
            "segmenter.silence_threshold_ms ({}) must be at least one frame ({} ms)",
            segmenter.silence_threshold_ms, segmenter.frame_ms
        ));
    }
    if segmenter.max_speech_ms < segmenter.frame_ms {
        return Err(format!(
            "segmenter.max_speech_ms ({}) must be at least one frame ({} ms)",
            segmenter.max_speech_ms, segmenter.frame_ms
        ));
    }

    let playback = &config.playback;
    if playback.sample_rate == 0 || playback.frame_ms == 0 || playback.channels == 0 {
        return Err(
            "playback.sample_rate, playback.channels and playback.frame_ms must be greater than 0"
                .to_string(),
        );
    }
    if playback.frame_samples() == 0 {
        return Err("playback frames must hold at least one sample".to_string());
    }
    if !(playback.pacing_factor > 0.0 && playback.pacing_factor <= 1.0) {
        return Err(format!(
            "playback.pacing_factor ({}) must be in (0, 1]",
            playback.pacing_factor
        ));
    }
    if playback.queue_depth == 0 {
        return Err("playback.queue_depth must be greater than 0".to_string());
    }

    Ok(())
}
