//! soundboard-server - audio file registry with live directory sync
//!
//! Catalogs the audio files in one directory, keeps the catalog in step with
//! the filesystem, and serves it (plus ranged file bytes) over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use soundboard_common::config::{
    load_toml_config, resolve_config_path, ConfigOverrides, ServerConfig, TomlConfig,
};
use soundboard_server::services::{AudioRegistry, RegistryConfig};
use soundboard_server::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

const DEFAULT_LOG_LEVEL: &str = "info";

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "soundboard-server")]
#[command(about = "Audio file registry and streaming server for a browser soundboard")]
#[command(version)]
struct Args {
    /// Directory of audio files to serve
    #[arg(long, env = "SOUNDBOARD_AUDIO_DIR")]
    audio_dir: Option<PathBuf>,

    /// Maximum accepted audio file size in bytes
    #[arg(long, env = "SOUNDBOARD_MAX_FILE_SIZE")]
    max_file_size: Option<u64>,

    /// Watch the directory for changes (true/false)
    #[arg(long, env = "SOUNDBOARD_WATCH", action = clap::ArgAction::Set)]
    watch: Option<bool>,

    /// Per-file metadata build timeout in milliseconds
    #[arg(long, env = "SOUNDBOARD_BUILD_TIMEOUT_MS")]
    build_timeout_ms: Option<u64>,

    /// Address to bind
    #[arg(long, env = "SOUNDBOARD_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SOUNDBOARD_PORT")]
    port: Option<u16>,

    /// Static frontend directory served at /
    #[arg(long, env = "SOUNDBOARD_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "SOUNDBOARD_LOG_LEVEL")]
    log_level: Option<String>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            audio_dir: self.audio_dir.clone(),
            max_file_size: self.max_file_size,
            watch: self.watch,
            build_timeout_ms: self.build_timeout_ms,
            host: self.host.clone(),
            port: self.port,
            public_dir: self.public_dir.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Start logging before the config file is read; its level applies afterwards
    let startup_level = args.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL).to_string();
    let log_filter = init_tracing(&startup_level);

    info!(
        "Starting soundboard-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load config file")?,
        None => {
            info!("No config directory available, using defaults");
            TomlConfig::default()
        }
    };
    let config = ServerConfig::resolve(args.overrides(), toml_config)
        .context("Invalid configuration")?;

    if let Some(handle) = log_filter {
        if config.log_level != startup_level {
            match handle.reload(level_filter(&config.log_level)) {
                Ok(()) => info!(level = %config.log_level, "Applied configured log level"),
                Err(e) => error!("Failed to apply log level {}: {}", config.log_level, e),
            }
        }
    }

    let registry = Arc::new(AudioRegistry::new(RegistryConfig::from(&config)));
    registry
        .initialize()
        .await
        .context("Failed to initialize audio registry")?;

    let state = AppState::new(Arc::clone(&registry)).with_public_dir(config.public_dir.clone());
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("soundboard-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let signalled = Arc::clone(&registry);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open SSE streams only end once the bus closes
            signalled.events().close();
        })
        .await;

    registry.shutdown().await;
    served.context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "soundboard_server={level},soundboard_common={level},tower_http={level}"
    ))
}

/// Install the global subscriber
///
/// Returns a reload handle only when the filter came from `level`; an explicit
/// `RUST_LOG` is never overridden.
fn init_tracing(level: &str) -> Option<reload::Handle<EnvFilter, Registry>> {
    let (filter, from_level) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, false),
        Err(_) => (level_filter(level), true),
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    from_level.then_some(handle)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
