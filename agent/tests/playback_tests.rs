//! Outbound playback tests
//!
//! Every session shares one outbound track. These tests check that answers
//! never interleave on it, that frames keep the track's layout and that the
//! final partial frame is padded.

mod fixtures;
mod mock_services;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use fixtures::*;
use mock_services::*;
use voice_agent::core::playback::prepare_frames;
use voice_agent::core::{PlaybackConfig, PlaybackRequest, PlaybackScheduler, TurnOutcome};

/// Lengths of consecutive runs of equal markers
fn runs(markers: &[i16]) -> Vec<(i16, usize)> {
    let mut runs: Vec<(i16, usize)> = Vec::new();
    for &m in markers {
        match runs.last_mut() {
            Some((level, len)) if *level == m => *len += 1,
            _ => runs.push((m, 1)),
        }
    }
    runs
}

#[tokio::test(start_paused = true)]
async fn test_answers_from_two_sessions_do_not_interleave() {
    let mut h = Harness::new(
        MockTranscriber::new(Transcript::Level),
        MockAnswers::echo(),
        // Half a second at the level the participant spoke at
        MockSynthesizer::new(Speech::LevelFromText { samples: 24000 }),
    );

    let alice = h.join_live("alice").await;
    let bob = h.join_live("bob").await;

    // Both finish speaking at the same moment
    for (a, b) in utterance_frames(10, SPEECH_LEVEL)
        .into_iter()
        .zip(utterance_frames(10, 6000))
    {
        alice.send(a).unwrap();
        bob.send(b).unwrap();
    }

    for _ in 0..2 {
        let (_, outcome) = h.next_finished().await;
        assert!(matches!(outcome, TurnOutcome::Answered { .. }));
    }
    h.wait_for_playback(2).await;

    let markers = h.sink.markers();
    assert_eq!(markers.len(), 50);

    let runs = runs(&markers);
    assert_eq!(runs.len(), 2, "playback interleaved: {runs:?}");
    assert!(runs.iter().all(|(_, len)| *len == 25));
    let mut levels: Vec<i16> = runs.iter().map(|(level, _)| *level).collect();
    levels.sort();
    assert_eq!(levels, vec![SPEECH_LEVEL, 6000]);
}

#[tokio::test(start_paused = true)]
async fn test_final_frame_is_zero_padded() {
    let mut h = Harness::new(
        MockTranscriber::new(Transcript::Fixed("hello".into())),
        MockAnswers::echo(),
        MockSynthesizer::new(Speech::Constant {
            samples: 1000,
            level: 1200,
        }),
    );

    h.join("alice", utterance_frames(10, SPEECH_LEVEL)).await;
    h.next_finished().await;
    h.wait_for_playback(1).await;

    let frames = h.sink.frames.lock().clone();
    assert_eq!(frames.len(), 2);
    assert!(frames[0].data.iter().all(|&s| s == 1200));

    let tail = &frames[1].data;
    assert_eq!(tail.len(), OUTBOUND_FRAME_SAMPLES);
    assert!(tail[..40].iter().all(|&s| s == 1200));
    assert!(tail[40..].iter().all(|&s| s == 0));
}

#[tokio::test(start_paused = true)]
async fn test_frames_are_paced_near_real_time() {
    let sink = Arc::new(RecordingSink::default());
    let (playback, _task) = PlaybackScheduler::spawn(sink.clone(), PlaybackConfig::default());

    let start = tokio::time::Instant::now();
    playback
        .enqueue(PlaybackRequest {
            participant: "alice".into(),
            audio: Bytes::from(wav_payload(48000, OUTBOUND_RATE, 1000)),
            cancel: CancellationToken::new(),
        })
        .await
        .unwrap();

    while playback.payloads_played() < 1 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let elapsed = start.elapsed();

    // 50 frames of 20 ms, paced at 95% of real time
    assert_eq!(sink.frame_count(), 50);
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1050), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_request_stops_mid_payload() {
    let sink = Arc::new(RecordingSink::default());
    let (playback, _task) = PlaybackScheduler::spawn(sink.clone(), PlaybackConfig::default());
    let cancel = CancellationToken::new();

    playback
        .enqueue(PlaybackRequest {
            participant: "alice".into(),
            audio: Bytes::from(wav_payload(48000, OUTBOUND_RATE, 1000)),
            cancel: cancel.clone(),
        })
        .await
        .unwrap();

    while sink.frame_count() < 10 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();

    while playback.payloads_skipped() < 1 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(sink.frame_count() < 50);
    assert_eq!(playback.payloads_played(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_after_shutdown_fails() {
    let sink = Arc::new(RecordingSink::default());
    let (playback, task) = PlaybackScheduler::spawn(sink, PlaybackConfig::default());

    playback.shutdown();
    task.await.unwrap();

    let result = playback
        .enqueue(PlaybackRequest {
            participant: "alice".into(),
            audio: Bytes::from(wav_payload(960, OUTBOUND_RATE, 1000)),
            cancel: CancellationToken::new(),
        })
        .await;
    assert!(result.is_err());
}

#[test]
fn test_narrowband_answer_is_upsampled_to_track_rate() {
    // 1 s of 16 kHz mono
    let payload = wav_payload(16000, SAMPLE_RATE, 2000);
    let frames = prepare_frames(&payload, &PlaybackConfig::default()).unwrap();

    assert_eq!(frames.len(), 50);
    for frame in &frames {
        assert_eq!(frame.sample_rate, OUTBOUND_RATE);
        assert_eq!(frame.num_channels, 1);
        assert_eq!(frame.data.len(), OUTBOUND_FRAME_SAMPLES);
    }

    // Away from the edges the level is preserved
    let middle = calculate_rms(&frames[25].data);
    assert!((middle - 2000.0).abs() < 100.0, "{middle}");
}

#[test]
fn test_stereo_track_layout() {
    let config = PlaybackConfig {
        channels: 2,
        ..PlaybackConfig::default()
    };
    let payload = wav_payload(4800, OUTBOUND_RATE, 1500);
    let frames = prepare_frames(&payload, &config).unwrap();

    // 100 ms in 20 ms frames, two interleaved channels
    assert_eq!(frames.len(), 5);
    assert!(frames.iter().all(|f| f.num_channels == 2
        && f.samples_per_channel as usize == OUTBOUND_FRAME_SAMPLES
        && f.data.len() == OUTBOUND_FRAME_SAMPLES * 2));
    assert!(frames[0].data.iter().all(|&s| s == 1500));
}
