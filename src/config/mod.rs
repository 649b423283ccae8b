//! Configuration Module
//!
//! Provides TOML-based configuration with support for:
//! - Logging level
//! - Bridges and their topic rules
//! - `${VAR}` / `${VAR:-default}` substitution inside the file
//! - Environment variable overrides (VIBEMQ__* prefix)

use std::collections::HashSet;
use std::path::Path;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use tokio::sync::mpsc;

pub use bridge::{BridgeConfig, BridgeTopicConfig, Direction, EMPTY_MARKER};

use crate::bridge::{BridgeError, BridgeRegistry, UpstreamRequest};

mod bridge;

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests;

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Validation error
    Validation(String),
    /// A bridge rejected one of its topic rules
    Bridge { name: String, source: BridgeError },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ConfigError::Bridge { name, source } => write!(f, "Bridge '{}': {}", name, source),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Config(e) => Some(e),
            ConfigError::Bridge { source, .. } => Some(source),
            ConfigError::Validation(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Bridge configurations, in registration order
    pub bridge: Vec<BridgeConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax in the TOML file
    /// 2. Override via env vars: `VIBEMQ__` prefix with double underscores for nesting,
    ///    e.g. `VIBEMQ__LOG__LEVEL=debug` overrides `log.level`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().set_default("log.level", "info")?;

        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let substituted = substitute_env_vars(&content);
                builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, use defaults
            }
            Err(e) => return Err(ConfigError::Io(e)),
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix("VIBEMQ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a string (for testing, no env var support)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();

        for bridge in &self.bridge {
            if bridge.name.is_empty() {
                return Err(ConfigError::Validation(
                    "bridge name cannot be empty".to_string(),
                ));
            }

            if !names.insert(bridge.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate bridge name '{}'",
                    bridge.name
                )));
            }

            if let Some(topic) = bridge.topics.iter().find(|t| t.qos > 2) {
                return Err(ConfigError::Validation(format!(
                    "Bridge '{}': qos must be 0, 1, or 2 (got {})",
                    bridge.name, topic.qos
                )));
            }
        }

        Ok(())
    }

    /// Register the topic rules of every enabled bridge.
    ///
    /// No partially registered bridge is ever returned.
    pub fn build_registry(
        &self,
        upstream: Option<&mpsc::UnboundedSender<UpstreamRequest>>,
    ) -> Result<BridgeRegistry, ConfigError> {
        BridgeRegistry::from_configs(&self.bridge, upstream)
    }
}
