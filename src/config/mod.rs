//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

/// Policy applied when a connection's outbound queue is full during broadcast
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendPolicy {
    /// Block the broadcaster until the queue drains (default)
    Block,
    /// Drop the newest payload for that connection
    DropNewest,
    /// Tear the stalled connection down
    Disconnect,
}

impl std::str::FromStr for SendPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(Self::Block),
            "drop-newest" => Ok(Self::DropNewest),
            "disconnect" => Ok(Self::Disconnect),
            _ => Err(ConfigError::InvalidSendPolicy),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// WebSocket read buffer size in bytes
    pub read_buffer_size: usize,
    /// WebSocket write buffer size in bytes
    pub write_buffer_size: usize,
    /// Outbound overflow policy for snapshot fan-out
    pub send_policy: SendPolicy,

    /// Seed for deterministic map generation
    pub map_seed: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting providers commonly inject PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            read_buffer_size: parse_or("WS_READ_BUFFER_SIZE", 1024)?,
            write_buffer_size: parse_or("WS_WRITE_BUFFER_SIZE", 1024)?,

            send_policy: match env::var("SEND_POLICY") {
                Ok(value) => value.parse()?,
                Err(_) => SendPolicy::Block,
            },

            map_seed: parse_or("MAP_SEED", 1)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidNumber(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),

    #[error("SEND_POLICY must be one of: block, drop-newest, disconnect")]
    InvalidSendPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_policy_parses_known_values() {
        assert_eq!("block".parse::<SendPolicy>().unwrap(), SendPolicy::Block);
        assert_eq!(
            "drop-newest".parse::<SendPolicy>().unwrap(),
            SendPolicy::DropNewest
        );
        assert_eq!(
            "disconnect".parse::<SendPolicy>().unwrap(),
            SendPolicy::Disconnect
        );
        assert!("oldest".parse::<SendPolicy>().is_err());
    }
}
