//! Main entry point for the Arena Ladder matchmaking server
//!
//! Loads configuration, installs logging, starts the server and waits for a
//! shutdown signal.

use anyhow::Result;
use arena_ladder::config::{validate_config, AppConfig};
use arena_ladder::service::{AppState, HealthCheck};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Arena Ladder - competitive matchmaking with Elo-balanced lobbies
#[derive(Parser)]
#[command(
    name = "arena-ladder",
    version,
    about = "A competitive matchmaking server with Elo-balanced lobbies",
    long_about = "Arena Ladder accepts line-protocol client sessions, queues players for \
                 ranked matches, groups them into lobbies bounded by rating variance, \
                 simulates outcomes from Elo odds and keeps a global leaderboard."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    #[arg(short, long, value_name = "PORT", help = "Override client port")]
    port: Option<u16>,

    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    #[arg(short, long, value_name = "COUNT", help = "Override dispatch worker count")]
    workers: Option<usize>,

    /// Play matches without touching ratings
    #[arg(long, help = "Do not update ratings or records after matches")]
    unrated: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without starting the server")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Log a status line every 30 seconds while the server runs
async fn health_check_task(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while app_state.is_running().await {
        interval.tick().await;

        match HealthCheck::check(app_state.clone()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} players, {} ranked, {} queued, {} active lobbies, {} matches",
                    health.status,
                    health.stats.registered_players,
                    health.stats.ranked_players,
                    health.stats.queue_depth,
                    health.stats.active_lobbies,
                    health.stats.matches_completed
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Arena Ladder matchmaking server");
    info!("   Service: {}", config.service.name);
    info!("   Listen: {}", config.listen_addr());
    info!("   Log level: {}", config.service.log_level);
    if config.service.enable_health_server {
        info!("   Health port: {}", config.service.health_port);
    }
    info!(
        "   Lobbies: {} players, variance <= {}",
        config.matchmaking.lobby_capacity, config.matchmaking.max_rating_variance
    );
    info!(
        "   Dispatch workers: {}, rated: {}",
        config.matchmaking.dispatch_workers, config.matchmaking.rated
    );
}

/// Load configuration from file or environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(port) = args.port {
        config.service.port = port;
    }
    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }
    if let Some(workers) = args.workers {
        config.matchmaking.dispatch_workers = workers;
    }
    if args.unrated {
        config.matchmaking.rated = false;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting the server");
        return Ok(());
    }

    display_startup_banner(&config);

    let app_state = match AppState::new(config).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start server: {}", e);
        std::process::exit(1);
    }

    let health_task = tokio::spawn(health_check_task(app_state.clone()));

    info!("Press Ctrl+C to shutdown gracefully...");
    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    if let Err(e) = app_state.shutdown().await {
        warn!("Shutdown finished with errors: {}", e);
    }

    info!("Arena Ladder stopped");
    Ok(())
}
