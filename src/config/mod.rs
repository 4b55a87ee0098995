//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::MapSize;
use crate::util::time::{DEFAULT_MAX_STEPS_PER_RUN, DEFAULT_SEND_RATE, DEFAULT_TICK_RATE};

/// Seconds an empty room survives before it closes
const DEFAULT_ROOM_IDLE_SECS: u32 = 60;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines (`LOG_FORMAT=json`)
    pub log_json: bool,
    /// Allowed client origins for CORS, comma-separated. `*` allows any.
    pub client_origin: String,

    /// Physics steps per second
    pub tick_rate: u32,
    /// Diff payloads per second
    pub send_rate: u32,
    /// Catch-up cap for one simulation run
    pub max_steps_per_run: u32,
    /// Map size for rooms created without one
    pub default_map_size: MapSize,
    /// Empty rooms close after this long
    pub room_idle_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match get("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => get("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let tick_rate = parse_rate(&get, "TICK_RATE", DEFAULT_TICK_RATE)?;
        let send_rate = parse_rate(&get, "SEND_RATE", DEFAULT_SEND_RATE)?;
        if send_rate > tick_rate {
            return Err(ConfigError::Invalid {
                key: "SEND_RATE",
                value: send_rate.to_string(),
            });
        }

        let default_map_size = match get("DEFAULT_MAP_SIZE") {
            Some(raw) => MapSize::from_str(raw.trim()).map_err(|_| ConfigError::Invalid {
                key: "DEFAULT_MAP_SIZE",
                value: raw,
            })?,
            None => MapSize::default(),
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: get("LOG_FORMAT").is_some_and(|f| f.trim().eq_ignore_ascii_case("json")),
            client_origin: get("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            tick_rate,
            send_rate,
            max_steps_per_run: parse_rate(&get, "MAX_STEPS_PER_RUN", DEFAULT_MAX_STEPS_PER_RUN)?,
            default_map_size,
            room_idle_timeout: Duration::from_secs(
                parse_rate(&get, "ROOM_IDLE_SECS", DEFAULT_ROOM_IDLE_SECS)?.into(),
            ),
        })
    }
}

/// Positive integer with a default
fn parse_rate(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}
