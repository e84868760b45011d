use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cross_recorder::{
    create_router, AppState, CaptureOrchestrator, Config, FileBackendFactory, LocalTransport,
    RecordingCatalog, RecordingConfig, RecordingController, SessionState, TrackKind, WavHeader,
};
use cross_recorder::audio::WAV_HEADER_SIZE;
use cross_recorder::storage::Preferences;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cross-recorder", version, about = "Multi-track audio recorder")]
struct Cli {
    /// Config file (without extension is fine)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the storage API over HTTP
    Serve,
    /// Record from WAV sources into a new recording
    Record {
        /// WAV file used as the microphone
        #[arg(long)]
        mic: Option<PathBuf>,
        /// WAV file used as system audio
        #[arg(long)]
        system: Option<PathBuf>,
        /// Stop after this many seconds
        #[arg(long, value_parser = parse_duration)]
        duration: Option<Duration>,
        /// Remember the chosen sources as defaults
        #[arg(long)]
        save_preferences: bool,
    },
    /// List finished recordings
    List,
    /// Delete a recording and its files
    Delete { id: String },
    /// Print the header of a track file
    Inspect { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.service.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let data_dir = cfg.storage.data_dir();
    info!("{} using data directory {}", cfg.service.name, data_dir.display());

    match cli.command {
        Command::Serve => serve(&cfg, data_dir).await,
        Command::Record {
            mic,
            system,
            duration,
            save_preferences,
        } => record(&cfg, data_dir, mic, system, duration, save_preferences).await,
        Command::List => list(data_dir),
        Command::Delete { id } => {
            RecordingCatalog::for_data_dir(&data_dir).delete_recording(&id)?;
            println!("Deleted {}", id);
            Ok(())
        }
        Command::Inspect { path } => inspect(path),
    }
}

async fn serve(cfg: &Config, data_dir: PathBuf) -> Result<()> {
    let transport = Arc::new(LocalTransport::for_data_dir(&data_dir));
    let app = create_router(AppState::new(transport));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

async fn record(
    cfg: &Config,
    data_dir: PathBuf,
    mic: Option<PathBuf>,
    system: Option<PathBuf>,
    duration: Option<Duration>,
    save_preferences: bool,
) -> Result<()> {
    let preferences = Preferences::for_data_dir(&data_dir);
    let saved = preferences.load()?;

    let mic_source = mic
        .map(|p| p.display().to_string())
        .or_else(|| saved.mic_enabled.then(|| saved.mic_device_id.clone()).flatten());

    let mut tracks = Vec::new();
    if mic_source.is_some() {
        tracks.push(TrackKind::Mic);
    }
    if system.is_some() {
        tracks.push(TrackKind::System);
    }
    if tracks.is_empty() {
        bail!("Nothing to record: pass --mic and/or --system");
    }

    if save_preferences {
        let format = cfg.recording.format();
        preferences.save(&RecordingConfig {
            sample_rate: format.sample_rate,
            channels: format.channels,
            bit_depth: format.bit_depth,
            mic_enabled: mic_source.is_some(),
            system_audio_enabled: system.is_some(),
            mic_device_id: mic_source.clone(),
        })?;
        info!("Saved preferences to {}", preferences.path().display());
    }

    let transport = Arc::new(LocalTransport::for_data_dir(&data_dir));
    let backends = FileBackendFactory {
        mic_source: None,
        system_source: system,
        buffer_frames: cfg.recording.buffer_frames,
        realtime: cfg.recording.realtime,
    };
    let orchestrator =
        CaptureOrchestrator::new(transport, Arc::new(backends), cfg.recording.format());

    let controller = RecordingController::new(orchestrator, mic_source);
    let handle = controller.handle();
    let runner = tokio::spawn(controller.run());

    let acquired = handle.start_recording(tracks).await;

    if let Some(SessionState::Error { message, .. }) = acquired {
        handle.shutdown();
        join_controller(runner).await;
        bail!("Failed to start recording: {}", message);
    }

    println!("Recording... (Ctrl-C to stop)");

    let sleep = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = sleep => info!("Duration reached"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = handle.wait_for(|s| !s.is_capturing()) => warn!("All tracks ended"),
    }

    handle.stop();

    let outcome = handle
        .wait_for(|s| matches!(s, SessionState::Idle | SessionState::Error { .. }))
        .await;

    let recording = handle.last_recording();
    handle.shutdown();
    join_controller(runner).await;

    match (outcome, recording) {
        (Some(SessionState::Idle), Some(metadata)) => {
            println!(
                "Saved {} ({:.1}s, {} bytes) to {}",
                metadata.id,
                metadata.duration_ms as f64 / 1000.0,
                metadata.file_size_bytes,
                metadata.file_path
            );
            Ok(())
        }
        (Some(SessionState::Error { message, .. }), _) => bail!("Recording failed: {}", message),
        _ => bail!("Recording ended without a result"),
    }
}

/// Parse `--duration` as a positive, finite number of seconds
fn parse_duration(arg: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = arg
        .parse()
        .map_err(|_| format!("{:?} is not a number of seconds", arg))?;
    if secs.is_nan() || secs <= 0.0 {
        return Err(format!("duration must be positive, got {}", arg));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration {}: {}", arg, e))
}

/// Await the controller task. Returns false if it panicked or was aborted.
async fn join_controller(runner: JoinHandle<()>) -> bool {
    match runner.await {
        Ok(()) => true,
        Err(e) => {
            warn!("Recording controller task failed: {}", e);
            false
        }
    }
}

fn list(data_dir: PathBuf) -> Result<()> {
    let recordings = RecordingCatalog::for_data_dir(&data_dir).get_recordings()?;
    if recordings.is_empty() {
        println!("No recordings");
        return Ok(());
    }

    for r in recordings {
        let tracks: Vec<String> = r.tracks.iter().map(|t| t.track_kind.to_string()).collect();
        println!(
            "{}  {}  {:>8.1}s  {:>10} bytes  [{}]",
            r.id,
            r.created_at.to_rfc3339(),
            r.duration_ms as f64 / 1000.0,
            r.file_size_bytes,
            tracks.join(", ")
        );
    }
    Ok(())
}

fn inspect(path: PathBuf) -> Result<()> {
    let mut buf = [0u8; WAV_HEADER_SIZE];
    std::fs::File::open(&path)
        .and_then(|mut f| f.read_exact(&mut buf))
        .with_context(|| format!("Failed to read header of {}", path.display()))?;

    let header = WavHeader::decode(&buf)?;
    println!("{}", path.display());
    println!("  sample rate: {} Hz", header.sample_rate);
    println!("  channels:    {}", header.channels);
    println!("  bit depth:   {}", header.bit_depth);
    println!("  byte rate:   {}", header.byte_rate());
    println!("  data size:   {} bytes", header.data_size);
    println!(
        "  duration:    {} ms",
        cross_recorder::audio::duration_ms(
            header.data_size as u64,
            header.sample_rate,
            header.channels,
            header.bit_depth
        )
    );
    Ok(())
}
