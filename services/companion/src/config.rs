//! Application Configuration Module
//!
//! This module centralizes the configuration for the companion service.
//! It loads settings from environment variables and provides a single
//! struct that the entry point hands to the transport, the core and the
//! console adapters.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:5000/ws";
pub const DEFAULT_SESSION_FILE: &str = ".roomie_session.json";
pub const DEFAULT_MOOD_POLL_MS: u64 = 5000;
pub const DEFAULT_MOOD_HISTORY: usize = 50;
pub const DEFAULT_PLAYBACK_MS: u64 = 3000;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub session_file: PathBuf,
    pub auto_listen: bool,
    /// `None` when polling is disabled.
    pub mood_poll: Option<Duration>,
    pub mood_history: usize,
    pub playback: Duration,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `ROOMIE_SERVER_URL`: (Optional) Websocket endpoint. Defaults to "ws://127.0.0.1:5000/ws".
    // *   `ROOMIE_SESSION_FILE`: (Optional) Where the restore record lives. Defaults to ".roomie_session.json".
    // *   `ROOMIE_AUTO_LISTEN`: (Optional) Restart capture after each turn. Defaults to "true".
    // *   `ROOMIE_MOOD_POLL_MS`: (Optional) Mood poll interval, "0" disables. Defaults to "5000".
    // *   `ROOMIE_MOOD_HISTORY`: (Optional) Mood samples kept for the summary. Defaults to "50".
    // *   `ROOMIE_PLAYBACK_MS`: (Optional) Simulated clip length. Defaults to "3000".
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url =
            lookup("ROOMIE_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let session_file = lookup("ROOMIE_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));

        let auto_listen = match lookup("ROOMIE_AUTO_LISTEN") {
            Some(value) => parse_bool("ROOMIE_AUTO_LISTEN", &value)?,
            None => true,
        };

        let mood_poll_ms = parse_number("ROOMIE_MOOD_POLL_MS", &lookup, DEFAULT_MOOD_POLL_MS)?;
        let mood_poll = (mood_poll_ms > 0).then(|| Duration::from_millis(mood_poll_ms));

        let mood_history = parse_number("ROOMIE_MOOD_HISTORY", &lookup, DEFAULT_MOOD_HISTORY)?;
        if mood_history == 0 {
            return Err(ConfigError::InvalidValue {
                name: "ROOMIE_MOOD_HISTORY".to_string(),
                value: "0".to_string(),
            });
        }

        let playback = Duration::from_millis(parse_number(
            "ROOMIE_PLAYBACK_MS",
            &lookup,
            DEFAULT_PLAYBACK_MS,
        )?);

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            server_url,
            session_file,
            auto_listen,
            mood_poll,
            mood_history,
            playback,
            log_level,
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_number<F, N>(name: &str, lookup: &F, default: N) -> Result<N, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    N: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<N>()
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
        None => Ok(default),
    }
}
