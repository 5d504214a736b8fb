use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voice_agent::AgentConfig;
use voice_agent::core::answer::HttpAnswerService;
use voice_agent::core::health::HealthProber;
use voice_agent::core::stt::HttpTranscriber;
use voice_agent::core::tts::HttpSynthesizer;
use voice_agent::core::vad::HttpSpeechDetector;
use voice_agent::core::{
    PlaybackScheduler, SessionManager, SessionManagerConfig, TurnPipeline, TurnServices,
};
use voice_agent::livekit::RoomConnection;

/// Probe deadline for the health endpoints, in seconds
const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Voice agent - real-time spoken conversation over LiveKit
#[derive(Parser, Debug)]
#[command(name = "voice-agent")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Join the room and hold conversations (default)
    Run,

    /// Probe the inference services and exit
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        AgentConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        AgentConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => check(&config).await,
        Commands::Run => run(config).await,
    }
}

async fn check(config: &AgentConfig) -> anyhow::Result<()> {
    let prober = HealthProber::new(std::time::Duration::from_secs(HEALTH_TIMEOUT_SECS))?;
    let reports = prober.probe_all(&config.health_targets()).await;

    let mut unhealthy = 0;
    for report in &reports {
        println!("{:<8} {:<45} {}", report.service, report.url, report.status);
        if !report.status.is_healthy() {
            unhealthy += 1;
        }
    }

    if unhealthy > 0 {
        anyhow::bail!("{unhealthy} of {} services are not healthy", reports.len());
    }
    Ok(())
}

async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let prober = HealthProber::new(std::time::Duration::from_secs(HEALTH_TIMEOUT_SECS))?;
    let reports = prober.probe_all(&config.health_targets()).await;
    if reports.iter().any(|r| !r.status.is_healthy()) {
        warn!("Some services are not healthy; turns depending on them will fail until they recover");
    }

    let services = &config.services;
    let timeouts = &config.timeouts;
    let detector = HttpSpeechDetector::new(services.vad_url.clone(), timeouts.detect())?;
    let stages = timeouts.stages();
    let transcriber = HttpTranscriber::new(
        services.stt_url.clone(),
        services.stt_language.clone(),
        stages.transcribe,
    )?;
    let answers = HttpAnswerService::new(
        services.answer_url.clone(),
        services.answer_clear_url.clone(),
        stages.answer,
    )?;
    let synthesizer = HttpSynthesizer::new(services.tts_url.clone(), stages.synthesize)?;

    let pipeline = TurnPipeline::new(
        TurnServices {
            transcriber: Arc::new(transcriber),
            answers: Arc::new(answers),
            synthesizer: Arc::new(synthesizer),
        },
        services.tts_language.clone(),
        stages,
    );

    let connection = RoomConnection::connect(&config.livekit, &config.playback).await?;
    let (playback, playback_task) = PlaybackScheduler::spawn(connection.sink(), config.playback);

    let manager = SessionManager::new(
        Arc::new(detector),
        pipeline,
        playback.clone(),
        SessionManagerConfig {
            bot_identity: config.livekit.bot_identity.clone(),
            segmenter: config.segmenter,
            detect_timeout: timeouts.detect(),
            clear_timeout: stages.answer,
            ..Default::default()
        },
    );

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
            ctrl_c.cancel();
        }
    });

    let result = connection.run(&manager, shutdown).await;

    playback.shutdown();
    if let Err(e) = playback_task.await {
        warn!("Playback task failed: {e}");
    }

    result?;
    info!("Voice agent stopped");
    Ok(())
}
