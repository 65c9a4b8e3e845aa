//! Server configuration module
//! Handles dynamic configuration parameters for the chat coordinator

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BOT_NAME, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_MAX_BODY_CHARS,
    DEFAULT_MAX_MESSAGES, DEFAULT_MENTION_COOLDOWN_MS, DEFAULT_MESSAGE_TTL_SECS, DEFAULT_PORT,
    DEFAULT_RATE_LIMIT_SENDS, DEFAULT_RATE_LIMIT_WINDOW_MS, DEFAULT_SWEEP_INTERVAL_SECS,
};
use crate::core::registry::validate_username;
use crate::error::{ParlorError, Result};

/// Tunables owned by the room coordinator itself.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Rolling history count cap.
    pub max_messages: usize,
    /// Rolling history age cap.
    pub message_ttl: Duration,
    /// Sends admitted per sender within the trailing window.
    pub rate_limit_sends: usize,
    /// Trailing window the send cap applies to.
    pub rate_limit_window: Duration,
    /// Per-sender cooldown on the distinguished mention action.
    pub mention_cooldown: Duration,
    /// Longest message body admitted, in characters.
    pub max_body_chars: usize,
    /// Display name of the resident bot; also reserved as a username.
    pub bot_name: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            message_ttl: Duration::from_secs(DEFAULT_MESSAGE_TTL_SECS),
            rate_limit_sends: DEFAULT_RATE_LIMIT_SENDS,
            rate_limit_window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
            mention_cooldown: Duration::from_millis(DEFAULT_MENTION_COOLDOWN_MS),
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
            bot_name: DEFAULT_BOT_NAME.to_string(),
        }
    }
}

/// Process-level configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub room: RoomConfig,
    /// How often the liveness sweep runs.
    pub sweep_interval: Duration,
    /// Silence threshold after which a connection is swept.
    pub connection_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            room: RoomConfig::default(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            connection_timeout: Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables if available;
    /// unset or unparseable variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let host = env::var("PARLOR_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env::var("PARLOR_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let max_messages = env::var("PARLOR_MAX_MESSAGES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_MESSAGES);

        let message_ttl_secs = env::var("PARLOR_MESSAGE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MESSAGE_TTL_SECS);

        let rate_limit_sends = env::var("PARLOR_RATE_LIMIT_SENDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT_SENDS);

        let rate_limit_window_ms = env::var("PARLOR_RATE_LIMIT_WINDOW_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_MS);

        let mention_cooldown_ms = env::var("PARLOR_MENTION_COOLDOWN_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MENTION_COOLDOWN_MS);

        let max_body_chars = env::var("PARLOR_MAX_BODY_CHARS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_BODY_CHARS);

        let bot_name = env::var("PARLOR_BOT_NAME").unwrap_or(DEFAULT_BOT_NAME.to_string());

        let sweep_interval_secs = env::var("PARLOR_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

        let connection_timeout_secs = env::var("PARLOR_CONNECTION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS);

        let config = Self {
            host,
            port,
            room: RoomConfig {
                max_messages,
                message_ttl: Duration::from_secs(message_ttl_secs),
                rate_limit_sends,
                rate_limit_window: Duration::from_millis(rate_limit_window_ms),
                mention_cooldown: Duration::from_millis(mention_cooldown_ms),
                max_body_chars,
                bot_name,
            },
            sweep_interval: Duration::from_secs(sweep_interval_secs),
            connection_timeout: Duration::from_secs(connection_timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the coordinator cannot operate under.
    fn validate(&self) -> Result<()> {
        if self.room.max_messages == 0 {
            return Err(ParlorError::ConfigError(
                "PARLOR_MAX_MESSAGES must be at least 1".to_string(),
            ));
        }
        if self.room.message_ttl.is_zero() {
            return Err(ParlorError::ConfigError(
                "PARLOR_MESSAGE_TTL_SECS must be at least 1".to_string(),
            ));
        }
        if self.room.rate_limit_sends == 0 {
            return Err(ParlorError::ConfigError(
                "PARLOR_RATE_LIMIT_SENDS must be at least 1".to_string(),
            ));
        }
        if self.room.rate_limit_window.is_zero() {
            return Err(ParlorError::ConfigError(
                "PARLOR_RATE_LIMIT_WINDOW_MS must be at least 1".to_string(),
            ));
        }
        if self.room.max_body_chars == 0 {
            return Err(ParlorError::ConfigError(
                "PARLOR_MAX_BODY_CHARS must be at least 1".to_string(),
            ));
        }
        // The bot name doubles as a reserved username and a mention
        // target, so it must satisfy the username policy itself.
        if validate_username(&self.room.bot_name).is_err() {
            return Err(ParlorError::ConfigError(format!(
                "PARLOR_BOT_NAME {:?} is not a valid display name",
                self.room.bot_name
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(ParlorError::ConfigError(
                "PARLOR_SWEEP_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_limits() {
        let config = ServerConfig::default();
        assert_eq!(config.room.max_messages, 50);
        assert_eq!(config.room.message_ttl, Duration::from_secs(120));
        assert_eq!(config.room.rate_limit_sends, 3);
        assert_eq!(config.room.rate_limit_window, Duration::from_millis(10_000));
        assert_eq!(config.room.mention_cooldown, Duration::from_millis(30_000));
        assert_eq!(config.room.max_body_chars, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_degenerate_limits() {
        let mut config = ServerConfig::default();
        config.room.max_messages = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.room.bot_name = "bad name!".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.room.rate_limit_sends = 0;
        assert!(config.validate().is_err());
    }
}
