//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! arena-ladder server, including file and environment variable loading
//! and validation.

use crate::config::lobby::MatchmakingSettings;
use crate::config::rating::RatingSettings;
use crate::rating::predictor::MAX_ROSTER_SIZE;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub rating: RatingSettings,
    pub protocol: ProtocolSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Address the game listener binds to
    pub host: String,
    /// Port for client connections
    pub port: u16,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Whether to serve the health and metrics endpoints
    pub enable_health_server: bool,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Wire protocol settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Longest accepted line, in bytes
    pub max_frame_length: usize,
    /// Leaderboard entries sent per page
    pub leaderboard_page_size: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "arena-ladder".to_string(),
            log_level: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 1233,
            health_port: 8080,
            enable_health_server: true,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            max_frame_length: 64 * 1024,
            leaderboard_page_size: 50,
        }
    }
}

/// Parse an environment variable if it is set
fn env_override<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", key, value)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HOST") {
            self.service.host = host;
        }
        if let Some(port) = env_override("PORT")? {
            self.service.port = port;
        }
        if let Some(port) = env_override("HEALTH_PORT")? {
            self.service.health_port = port;
        }
        if let Some(enabled) = env_override("ENABLE_HEALTH_SERVER")? {
            self.service.enable_health_server = enabled;
        }
        if let Some(timeout) = env_override("SHUTDOWN_TIMEOUT_SECONDS")? {
            self.service.shutdown_timeout_seconds = timeout;
        }

        // Matchmaking settings
        if let Some(workers) = env_override("DISPATCH_WORKERS")? {
            self.matchmaking.dispatch_workers = workers;
        }
        if let Some(capacity) = env_override("LOBBY_CAPACITY")? {
            self.matchmaking.lobby_capacity = capacity;
        }
        if let Some(rated) = env_override("RATED_MATCHES")? {
            self.matchmaking.rated = rated;
        }
        if let Some(variance) = env_override("MAX_RATING_VARIANCE")? {
            self.matchmaking.max_rating_variance = variance;
        }
        if let Some(min) = env_override("MIN_MATCH_DURATION_MS")? {
            self.matchmaking.min_match_duration_ms = min;
        }
        if let Some(max) = env_override("MAX_MATCH_DURATION_MS")? {
            self.matchmaking.max_match_duration_ms = max;
        }

        // Rating settings
        if let Some(initial) = env_override("INITIAL_RATING")? {
            self.rating.initial_rating = initial;
        }
        if let Some(k) = env_override("K_FACTOR")? {
            self.rating.k_factor = k;
        }

        // Protocol settings
        if let Some(max_len) = env_override("MAX_FRAME_LENGTH")? {
            self.protocol.max_frame_length = max_len;
        }
        if let Some(page) = env_override("LEADERBOARD_PAGE_SIZE")? {
            self.protocol.leaderboard_page_size = page;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Address of the game listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.service.host, self.service.port)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.port == 0 {
        return Err(anyhow!("Port cannot be 0"));
    }
    if config.service.enable_health_server && config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate matchmaking settings
    let matchmaking = &config.matchmaking;
    if matchmaking.dispatch_workers == 0 {
        return Err(anyhow!("At least one dispatch worker is required"));
    }
    if matchmaking.lobby_capacity < 2 {
        return Err(anyhow!("Lobby capacity must be at least 2"));
    }
    if matchmaking.lobby_capacity > MAX_ROSTER_SIZE {
        return Err(anyhow!(
            "Lobby capacity cannot exceed {} players",
            MAX_ROSTER_SIZE
        ));
    }
    if matchmaking.max_rating_variance <= 0.0 {
        return Err(anyhow!("Max rating variance must be positive"));
    }
    if matchmaking.min_match_duration_ms > matchmaking.max_match_duration_ms {
        return Err(anyhow!(
            "Min match duration ({}ms) exceeds max match duration ({}ms)",
            matchmaking.min_match_duration_ms,
            matchmaking.max_match_duration_ms
        ));
    }

    // Validate rating settings
    if config.rating.k_factor <= 0.0 {
        return Err(anyhow!("K factor must be positive"));
    }

    // Validate protocol settings
    if config.protocol.max_frame_length == 0 {
        return Err(anyhow!("Max frame length must be greater than 0"));
    }
    if config.protocol.leaderboard_page_size == 0 {
        return Err(anyhow!("Leaderboard page size must be greater than 0"));
    }

    Ok(())
}
