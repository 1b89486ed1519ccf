//! Configuration management for the AS4 agent
//!
//! This module provides file and environment based configuration with
//! support for defaults and validation.

use crate::compression::DEFAULT_MAX_DECOMPRESSED_SIZE;
use crate::ebms::DEFAULT_MESSAGE_ID_DOMAIN;
use crate::logging::{LogConfig, LogLevel};
use crate::sender::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main agent configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent identity and profile
    pub agent: AgentSection,

    /// PMode storage
    pub pmodes: PModeStoreConfig,

    /// Duplicate detection
    pub duplicates: DuplicateConfig,

    /// Outbound retry defaults
    pub send: SendConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Agent identity and profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Interoperability profile id (cef, esens, peppol, entsog)
    pub profile: String,

    /// Tolerate plain http endpoints
    pub debug_mode: bool,

    /// Party id this agent sends as
    pub party_id: Option<String>,

    /// Domain part of generated message ids
    pub message_id_domain: String,

    /// Largest inflated size of one compressed attachment, in bytes
    pub max_decompressed_size: u64,
}

/// PMode storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PModeStoreConfig {
    /// JSON file holding the PModes; in memory when absent
    pub store_path: Option<PathBuf>,
}

/// Duplicate detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Detect duplicate inbound messages
    pub enabled: bool,

    /// JSON file holding the seen ids; in memory when absent
    pub store_path: Option<PathBuf>,

    /// How long a message id is remembered
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
}

/// Outbound retry defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendConfig {
    /// Total attempts per message
    pub max_attempts: u32,

    /// Pause between attempts
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            profile: "cef".to_string(),
            debug_mode: false,
            party_id: None,
            message_id_domain: DEFAULT_MESSAGE_ID_DOMAIN.to_string(),
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
        }
    }
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store_path: None,
            retention: Duration::from_secs(14 * 24 * 3600),
        }
    }
}

impl Default for SendConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            retry_interval: policy.retry_interval,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl SendConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_interval)
    }
}

impl LoggingConfig {
    /// Logging subsystem settings; an unknown level falls back to info
    pub fn log_config(&self) -> LogConfig {
        LogConfig::new(LogLevel::from_name(&self.level).unwrap_or_default())
            .with_timestamp(self.with_timestamp)
            .with_target(self.with_target)
            .json_format(self.json_format)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", name, e)))
}

impl AgentConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: AS4_<SECTION>_<KEY>
    /// Example: AS4_AGENT_PROFILE=peppol
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields with any `AS4_*` variables that are set
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Agent config
        if let Ok(profile) = env::var("AS4_AGENT_PROFILE") {
            self.agent.profile = profile;
        }
        if let Ok(debug) = env::var("AS4_AGENT_DEBUG_MODE") {
            self.agent.debug_mode = parse_var("debug mode flag", &debug)?;
        }
        if let Ok(party_id) = env::var("AS4_AGENT_PARTY_ID") {
            self.agent.party_id = Some(party_id);
        }
        if let Ok(domain) = env::var("AS4_AGENT_MESSAGE_ID_DOMAIN") {
            self.agent.message_id_domain = domain;
        }
        if let Ok(size) = env::var("AS4_AGENT_MAX_DECOMPRESSED_SIZE") {
            self.agent.max_decompressed_size = parse_var("max decompressed size", &size)?;
        }

        // Stores
        if let Ok(path) = env::var("AS4_PMODES_STORE_PATH") {
            self.pmodes.store_path = Some(PathBuf::from(path));
        }
        if let Ok(enabled) = env::var("AS4_DUPLICATES_ENABLED") {
            self.duplicates.enabled = parse_var("duplicates flag", &enabled)?;
        }
        if let Ok(path) = env::var("AS4_DUPLICATES_STORE_PATH") {
            self.duplicates.store_path = Some(PathBuf::from(path));
        }
        if let Ok(retention) = env::var("AS4_DUPLICATES_RETENTION") {
            self.duplicates.retention = humantime_serde::re::humantime::parse_duration(&retention)
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid retention: {}", e)))?;
        }

        // Send config
        if let Ok(attempts) = env::var("AS4_SEND_MAX_ATTEMPTS") {
            self.send.max_attempts = parse_var("max attempts", &attempts)?;
        }
        if let Ok(interval) = env::var("AS4_SEND_RETRY_INTERVAL") {
            self.send.retry_interval = humantime_serde::re::humantime::parse_duration(&interval)
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid retry interval: {}", e)))?;
        }

        // Logging config
        if let Ok(level) = env::var("AS4_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = env::var("AS4_LOG_JSON") {
            self.logging.json_format = parse_var("JSON flag", &json)?;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.profile.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "agent.profile must not be empty".to_string(),
            ));
        }

        if self.agent.message_id_domain.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "agent.message_id_domain must not be empty".to_string(),
            ));
        }

        if self.agent.max_decompressed_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "agent.max_decompressed_size must be greater than 0".to_string(),
            ));
        }

        if self.send.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "send.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.duplicates.enabled && self.duplicates.retention.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "duplicates.retention must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::FileWriteError {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }
}
