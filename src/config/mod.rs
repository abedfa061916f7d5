//! Configuration - CLI flags with environment variable fallbacks

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;

/// Command-line interface. Every flag can also be supplied through the
/// corresponding environment variable (loaded from `.env` by main).
#[derive(Debug, Clone, Parser)]
#[command(name = "coin-arena-server", version, about = "Authoritative coin-collection arena server")]
pub struct Cli {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8765)]
    pub port: u16,

    /// Simulated one-way network latency in milliseconds, applied to both
    /// inbound inputs and outbound messages
    #[arg(long, env = "LATENCY_MS", default_value_t = 200)]
    pub latency_ms: u64,

    /// Maximum concurrent player sessions
    #[arg(long, env = "MAX_PLAYERS", default_value_t = 2)]
    pub max_players: usize,

    /// Round length in seconds
    #[arg(long, env = "ROUND_SECS", default_value_t = 180)]
    pub round_secs: u64,

    /// Pause between rounds in seconds
    #[arg(long, env = "INTERMISSION_SECS", default_value_t = 10)]
    pub intermission_secs: u64,

    /// Disconnect a session after this many seconds without any frame
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 10)]
    pub idle_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Validated application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Simulated one-way wire latency
    pub latency: Duration,
    /// Maximum concurrent player sessions
    pub max_players: usize,
    /// Round length
    pub round_duration: Duration,
    /// Pause between rounds
    pub intermission: Duration,
    /// Per-connection idle cutoff
    pub idle_timeout: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Validate and lower CLI arguments into a runtime configuration
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.max_players == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        if cli.round_secs == 0 {
            return Err(ConfigError::InvalidRoundLength);
        }

        Ok(Self {
            server_addr: SocketAddr::new(cli.host, cli.port),
            latency: Duration::from_millis(cli.latency_ms),
            max_players: cli.max_players,
            round_duration: Duration::from_secs(cli.round_secs),
            intermission: Duration::from_secs(cli.intermission_secs),
            idle_timeout: Duration::from_secs(cli.idle_timeout_secs),
            log_level: cli.log_level,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max-players must be at least 1")]
    InvalidCapacity,

    #[error("round-secs must be at least 1")]
    InvalidRoundLength,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        // Keep ambient environment out of flag fallbacks.
        for var in [
            "HOST",
            "PORT",
            "LATENCY_MS",
            "MAX_PLAYERS",
            "ROUND_SECS",
            "INTERMISSION_SECS",
            "IDLE_TIMEOUT_SECS",
            "LOG_LEVEL",
        ] {
            std::env::remove_var(var);
        }
        Cli::parse_from(std::iter::once("coin-arena-server").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_match_demo_setup() {
        let config = Config::from_cli(cli(&[])).unwrap();
        assert_eq!(config.server_addr.port(), 8765);
        assert_eq!(config.latency, Duration::from_millis(200));
        assert_eq!(config.max_players, 2);
        assert_eq!(config.round_duration, Duration::from_secs(180));
        assert_eq!(config.intermission, Duration::from_secs(10));
    }

    #[test]
    fn flags_override_defaults() {
        let config =
            Config::from_cli(cli(&["--port", "9000", "--latency-ms", "0", "--max-players", "4"]))
                .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
        assert_eq!(config.latency, Duration::ZERO);
        assert_eq!(config.max_players, 4);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            Config::from_cli(cli(&["--max-players", "0"])),
            Err(ConfigError::InvalidCapacity)
        ));
    }
}
