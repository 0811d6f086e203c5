//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::input::HELD_KEY_PERIOD;
use crate::game::physics::{ArenaBounds, AVATAR_SIZE, EDGE_MARGIN};
use crate::game::r#match::ROUNDS_TARGET;

/// Relay server configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
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

            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:4200".to_string()),
        })
    }
}

/// Peer engine tunables
#[derive(Clone, Debug, PartialEq)]
pub struct ArenaConfig {
    pub arena: ArenaBounds,
    /// Re-emission period while a key is held
    pub held_key_period: Duration,
    /// Projectile animation frame period
    pub frame_period: Duration,
    /// "Match found" display before the first round
    pub match_found_delay: Duration,
    /// Round/match outcome display
    pub round_end_delay: Duration,
    /// "Opponent left" display before returning to the lobby
    pub disconnect_delay: Duration,
    /// Give up waiting for an opponent after this long
    pub join_timeout: Duration,
    pub rounds_target: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            arena: ArenaBounds::new(1000.0, 600.0),
            held_key_period: HELD_KEY_PERIOD,
            frame_period: Duration::from_millis(16),
            match_found_delay: Duration::from_secs(1),
            round_end_delay: Duration::from_secs(5),
            disconnect_delay: Duration::from_secs(1),
            join_timeout: Duration::from_secs(30),
            rounds_target: ROUNDS_TARGET,
        }
    }
}

impl ArenaConfig {
    /// Defaults, overridden by any `ARENA_*` variables that are set
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            arena: ArenaBounds::new(
                parse_var("ARENA_WIDTH")?.unwrap_or(defaults.arena.width),
                parse_var("ARENA_HEIGHT")?.unwrap_or(defaults.arena.height),
            ),
            held_key_period: millis_var("ARENA_HELD_KEY_MS")?.unwrap_or(defaults.held_key_period),
            frame_period: millis_var("ARENA_FRAME_MS")?.unwrap_or(defaults.frame_period),
            match_found_delay: millis_var("ARENA_MATCH_FOUND_MS")?
                .unwrap_or(defaults.match_found_delay),
            round_end_delay: millis_var("ARENA_ROUND_END_MS")?.unwrap_or(defaults.round_end_delay),
            disconnect_delay: millis_var("ARENA_DISCONNECT_MS")?
                .unwrap_or(defaults.disconnect_delay),
            join_timeout: millis_var("ARENA_JOIN_TIMEOUT_MS")?.unwrap_or(defaults.join_timeout),
            rounds_target: parse_var("ARENA_ROUNDS")?.unwrap_or(defaults.rounds_target),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject tunables the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        // An avatar plus both margins must fit on each axis
        let min_extent = AVATAR_SIZE + 2.0 * EDGE_MARGIN;
        if !(self.arena.width >= min_extent) {
            return Err(ConfigError::Invalid("ARENA_WIDTH"));
        }
        if !(self.arena.height >= min_extent) {
            return Err(ConfigError::Invalid("ARENA_HEIGHT"));
        }
        if self.held_key_period.is_zero() {
            return Err(ConfigError::Invalid("ARENA_HELD_KEY_MS"));
        }
        if self.frame_period.is_zero() {
            return Err(ConfigError::Invalid("ARENA_FRAME_MS"));
        }
        if self.rounds_target == 0 {
            return Err(ConfigError::Invalid("ARENA_ROUNDS"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

fn millis_var(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_var::<u64>(name)?.map(Duration::from_millis))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_defaults() {
        let config = ArenaConfig::default();
        assert_eq!(config.held_key_period, Duration::from_millis(20));
        assert_eq!(config.round_end_delay, Duration::from_secs(5));
        assert_eq!(config.rounds_target, 6);
        assert_eq!(config.arena.max_left(), 950.0);
    }

    #[test]
    fn env_overrides_and_rejects_garbage() {
        // Variables unique to this test so parallel tests are unaffected
        env::set_var("ARENA_TEST_ONLY_MS", "250");
        assert_eq!(
            millis_var("ARENA_TEST_ONLY_MS").unwrap(),
            Some(Duration::from_millis(250))
        );
        env::set_var("ARENA_TEST_ONLY_BAD", "fast");
        assert!(matches!(
            parse_var::<u32>("ARENA_TEST_ONLY_BAD"),
            Err(ConfigError::Invalid("ARENA_TEST_ONLY_BAD"))
        ));
        assert_eq!(parse_var::<u32>("ARENA_TEST_ONLY_UNSET").unwrap(), None);
    }

    #[test]
    fn zero_periods_and_cramped_arenas_are_rejected() {
        assert!(ArenaConfig::default().validate().is_ok());

        let cases = [
            (
                ArenaConfig {
                    held_key_period: Duration::ZERO,
                    ..ArenaConfig::default()
                },
                "ARENA_HELD_KEY_MS",
            ),
            (
                ArenaConfig {
                    frame_period: Duration::ZERO,
                    ..ArenaConfig::default()
                },
                "ARENA_FRAME_MS",
            ),
            (
                ArenaConfig {
                    arena: ArenaBounds::new(59.0, 600.0),
                    ..ArenaConfig::default()
                },
                "ARENA_WIDTH",
            ),
            (
                ArenaConfig {
                    arena: ArenaBounds::new(1000.0, f32::NAN),
                    ..ArenaConfig::default()
                },
                "ARENA_HEIGHT",
            ),
            (
                ArenaConfig {
                    rounds_target: 0,
                    ..ArenaConfig::default()
                },
                "ARENA_ROUNDS",
            ),
        ];
        for (config, var) in cases {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(name)) if name == var));
        }

        let smallest = ArenaConfig {
            arena: ArenaBounds::new(60.0, 60.0),
            ..ArenaConfig::default()
        };
        assert!(smallest.validate().is_ok());
    }

    #[test]
    fn from_env_validates_overrides() {
        // Only this test touches ARENA_FRAME_MS
        env::set_var("ARENA_FRAME_MS", "0");
        let result = ArenaConfig::from_env();
        env::remove_var("ARENA_FRAME_MS");
        assert!(matches!(result, Err(ConfigError::Invalid("ARENA_FRAME_MS"))));
    }
}
