use super::AgentConfig;
use super::env::load_from_env;
use super::yaml::YamlConfig;

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Environment-derived configuration with YAML values applied on top.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(livekit) = yaml.livekit {
        set(&mut config.livekit.url, livekit.url);
        set(&mut config.livekit.api_key, livekit.api_key);
        set(&mut config.livekit.api_secret, livekit.api_secret);
        set(&mut config.livekit.room, livekit.room);
        set(&mut config.livekit.bot_identity, livekit.bot_identity);
        set(&mut config.livekit.bot_name, livekit.bot_name);
    }

    if let Some(services) = yaml.services {
        set(&mut config.services.vad_url, services.vad_url);
        set(&mut config.services.stt_url, services.stt_url);
        set(&mut config.services.tts_url, services.tts_url);
        set(&mut config.services.answer_url, services.answer_url);
        if let Some(url) = services.answer_clear_url {
            config.services.answer_clear_url = Some(url).filter(|u| !u.is_empty());
        }
        set(&mut config.services.stt_language, services.stt_language);
        set(&mut config.services.tts_language, services.tts_language);
    }

    if let Some(timeouts) = yaml.timeouts {
        set(&mut config.timeouts.detect_ms, timeouts.detect_ms);
        set(&mut config.timeouts.transcribe_ms, timeouts.transcribe_ms);
        set(&mut config.timeouts.answer_ms, timeouts.answer_ms);
        set(&mut config.timeouts.synthesize_ms, timeouts.synthesize_ms);
    }

    if let Some(segmenter) = yaml.segmenter {
        set(&mut config.segmenter.frame_ms, segmenter.frame_ms);
        set(&mut config.segmenter.sample_rate, segmenter.sample_rate);
        set(
            &mut config.segmenter.silence_threshold_ms,
            segmenter.silence_threshold_ms,
        );
        set(&mut config.segmenter.max_speech_ms, segmenter.max_speech_ms);
    }

    if let Some(playback) = yaml.playback {
        set(&mut config.playback.sample_rate, playback.sample_rate);
        set(&mut config.playback.channels, playback.channels);
        set(&mut config.playback.frame_ms, playback.frame_ms);
        set(&mut config.playback.pacing_factor, playback.pacing_factor);
        set(&mut config.playback.queue_depth, playback.queue_depth);
    }

    Ok(config)
}
