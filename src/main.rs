use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rescue_rover::actuation::{self, CommandDispatcher};
use rescue_rover::auth::SessionStore;
use rescue_rover::config::{self, AppConfig, BackendMode};
use rescue_rover::state::AppState;
use rescue_rover::stream::MjpegStreamHandler;
use rescue_rover::video::{
    standby_jpeg, CaptureHandle, Frames, JpegEncoder, Resolution, RetryPolicy, V4l2Source,
};
use rescue_rover::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Rescue Rover command line arguments
#[derive(Parser, Debug)]
#[command(name = "rescue-rover")]
#[command(version, about = "Remote-operated rescue robot with live camera", long_about = None)]
struct CliArgs {
    /// JSON configuration file
    #[arg(short = 'c', long, value_name = "FILE", env = "ROVER_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short = 'a', long, value_name = "ADDRESS", env = "ROVER_ADDRESS")]
    address: Option<String>,

    /// HTTP port (overrides config)
    #[arg(short = 'p', long, value_name = "PORT", env = "ROVER_PORT")]
    http_port: Option<u16>,

    /// Motor controller serial port (overrides config)
    #[arg(long, value_name = "PATH", env = "ROVER_SERIAL_PORT")]
    serial_port: Option<String>,

    /// Actuation backend: auto, serial, pins or simulated (overrides config)
    #[arg(short = 'b', long, value_name = "MODE", env = "ROVER_BACKEND")]
    backend: Option<BackendMode>,

    /// Camera device (overrides config)
    #[arg(long, value_name = "PATH", env = "ROVER_VIDEO_DEVICE")]
    video_device: Option<String>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info", env = "ROVER_LOG_LEVEL")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl CliArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(ref address) = self.address {
            config.web.bind_address = address.clone();
        }
        if let Some(port) = self.http_port {
            config.web.http_port = port;
        }
        if let Some(ref port) = self.serial_port {
            config.actuation.serial_port = port.clone();
        }
        if let Some(mode) = self.backend {
            config.actuation.mode = mode;
        }
        if let Some(ref device) = self.video_device {
            config.video.device = device.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting Rescue Rover v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_or_default(args.config.as_deref())
        .await
        .context("failed to load configuration")?;
    args.apply(&mut config);

    // Probing hardware blocks (serial settle delay), keep it off the runtime
    let actuation_config = config.actuation.clone();
    let backend = tokio::task::spawn_blocking(move || actuation::select(&actuation_config))
        .await
        .context("backend selection panicked")?;
    let dispatcher = Arc::new(CommandDispatcher::new(backend));

    let mjpeg = Arc::new(MjpegStreamHandler::new());
    let capture = start_capture(&config, mjpeg.clone());

    let sessions = SessionStore::from_tokens(&config.auth.tokens);
    if sessions.is_empty() {
        tracing::warn!("No access tokens configured; every request except /api/health will be rejected");
    } else {
        tracing::info!("Loaded {} access tokens", sessions.len());
    }
    let bind_addr: SocketAddr = format!("{}:{}", config.web.bind_address, config.web.http_port)
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.web.bind_address))?;

    let state = AppState::new(config, sessions, dispatcher, mjpeg);
    let app = web::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on http://{}", bind_addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    tokio::select! {
        _ = shutdown_signal => {
            cleanup(&state, capture).await;
        }
        result = async move { axum::serve(listener, app).await } => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
            cleanup(&state, capture).await;
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Initialize logging with the given log level
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "rescue_rover=error,tower_http=error",
        LogLevel::Warn => "rescue_rover=warn,tower_http=warn",
        LogLevel::Info => "rescue_rover=info,tower_http=info",
        LogLevel::Verbose => "rescue_rover=debug,tower_http=info",
        LogLevel::Debug => "rescue_rover=debug,tower_http=debug",
        LogLevel::Trace => "rescue_rover=trace,tower_http=debug",
    };

    // RUST_LOG takes priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Start the camera thread feeding `hub`
fn start_capture(config: &AppConfig, hub: Arc<MjpegStreamHandler>) -> CaptureHandle {
    let video = &config.video;
    let resolution = Resolution::new(video.width, video.height);
    let source = V4l2Source::from_config(video);

    let mut encoder = JpegEncoder::new(video.quality);
    let standby = standby_jpeg(&mut encoder, resolution);

    let mut frames = Frames::new(source, encoder, RetryPolicy::from_config(&video.retry));
    if let Some(jpeg) = standby {
        frames = frames.with_standby_frame(jpeg);
    }

    tracing::info!(
        "Camera {} at {} (quality {})",
        video.device,
        resolution,
        video.quality
    );
    CaptureHandle::spawn(frames, hub)
}

/// Stop capture and bring the robot to rest
async fn cleanup(state: &Arc<AppState>, capture: CaptureHandle) {
    capture.shutdown().await;
    tracing::info!("Camera stopped");

    let dispatcher = state.dispatcher.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || dispatcher.shutdown()).await {
        tracing::warn!("Actuation shutdown task failed: {}", e);
    }
}
