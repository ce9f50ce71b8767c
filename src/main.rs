use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use sysinfo::System;

use pooled_audio::audio_system::{AudioEngine, BusGains, ClipHandle, RodioBackend};
use pooled_audio::{AppResult, AudioEvent, EngineConfig, JsonFileStore};

const LOG_TARGET_STARTUP: &str = "pooled_audio::startup";

/// Frame time of the demo host loop
const FRAME: Duration = Duration::from_millis(16);

/// Initialize tracing with file rotation
///
/// Logs are written to `<config dir>/PooledAudio/logs/`, one file per day
/// (`pooled-audio.YYYY-MM-DD.log`). Debug builds also log to the console.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("PooledAudio").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "pooled-audio.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting Pooled Audio v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
}

/// Read every configured clip up front. A clip that fails here is reported
/// once and retried on its first start.
fn preload_clips(backend: &mut RodioBackend, config: &EngineConfig) {
    let mut loaded = 0;
    for (name, asset) in &config.assets {
        match backend.preload(&ClipHandle::new(&asset.clip)) {
            Ok(()) => loaded += 1,
            Err(e) => tracing::warn!(asset = %name, "Failed to preload clip: {:#}", anyhow::Error::new(e)),
        }
    }
    tracing::info!("Preloaded {}/{} clips", loaded, config.assets.len());
}

struct Args {
    config: Option<PathBuf>,
    assets: PathBuf,
    timeout: Duration,
    requests: Vec<String>,
}

const USAGE: &str = "usage: pooled-audio [--config FILE] [--assets DIR] [--timeout SECS] \
                     [music:KEY | ambience:KEY | KEY]...";

fn parse_args() -> AppResult<Args> {
    let mut args = Args {
        config: None,
        assets: PathBuf::from("."),
        timeout: Duration::from_secs(30),
        requests: Vec::new(),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config = Some(iter.next().context(USAGE)?.into()),
            "--assets" => args.assets = iter.next().context(USAGE)?.into(),
            "--timeout" => {
                let secs: f32 = iter
                    .next()
                    .context(USAGE)?
                    .parse()
                    .context("--timeout expects seconds")?;
                args.timeout = Duration::try_from_secs_f32(secs.max(0.0)).unwrap_or_default();
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            _ => args.requests.push(arg),
        }
    }
    Ok(args)
}

fn main() -> AppResult<()> {
    initialize_tracing();
    log_runtime_environment();

    let args = parse_args()?;

    let config_path = args
        .config
        .or_else(EngineConfig::default_path)
        .context("No config file given and no user config directory")?;
    let config = EngineConfig::load(&config_path)
        .with_context(|| format!("Failed to load audio config {}", config_path.display()))?;

    let store = JsonFileStore::open_default().context("Failed to open settings store")?;
    let gains = BusGains::new();
    let mut backend = RodioBackend::try_new(&args.assets, gains.clone())
        .context("Failed to open audio output")?;
    preload_clips(&mut backend, &config);

    let mut engine = AudioEngine::new(&config, Box::new(backend), Box::new(gains), Box::new(store));
    if !engine.handle().install_global() {
        tracing::warn!("A global audio handle was already installed");
    }

    let events = engine.events().subscribe();

    for request in &args.requests {
        match request.split_once(':') {
            Some(("music", key)) => engine.play_music(key),
            Some(("ambience", key)) => engine.play_ambience(key, true, Duration::from_secs(1)),
            _ => engine.play_effect(request.as_str(), None),
        }
    }

    let started = Instant::now();
    loop {
        let frame_start = Instant::now();
        engine.update(FRAME);

        while let Ok(event) = events.try_recv() {
            match event {
                AudioEvent::MusicInvoked { .. } => tracing::info!("{}", event.description()),
                _ => tracing::debug!("{}", event.description()),
            }
        }

        if engine.is_idle() {
            tracing::info!("Nothing left to play");
            break;
        }
        if started.elapsed() >= args.timeout {
            tracing::info!("Timeout reached after {:?}", args.timeout);
            break;
        }

        std::thread::sleep(FRAME.saturating_sub(frame_start.elapsed()));
    }

    engine.shutdown();
    Ok(())
}
