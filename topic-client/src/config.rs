//! Configuration loading for topicsync.
//!
//! Configuration is loaded from a TOML file (default: `topic.toml`). Every
//! section and field is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration for a topic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicConfig {
    /// Topic identity.
    #[serde(default)]
    pub topic: TopicSection,
    /// Publish behaviour.
    #[serde(default)]
    pub publish: PublishConfig,
    /// Delete behaviour.
    #[serde(default)]
    pub delete: DeleteConfig,
    /// Logging defaults.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Topic identity.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicSection {
    /// Topic name used in session calls (default: `grpDefault`).
    #[serde(default = "default_topic_name")]
    pub name: String,
    /// The acting user (default: `usrLocal`).
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

/// Publish configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    /// Ask the server to echo our own messages back (default: true).
    #[serde(default = "default_echo")]
    pub echo: bool,
    /// Send receive/read watermarks to the server (default: true).
    #[serde(default = "default_sync_receipts")]
    pub sync_receipts: bool,
}

/// Delete configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteConfig {
    /// Hard-delete when the caller does not say (default: false).
    #[serde(default)]
    pub hard: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter used when `RUST_LOG` is unset (default: `info`).
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_topic_name() -> String {
    "grpDefault".to_string()
}

fn default_user_id() -> String {
    "usrLocal".to_string()
}

fn default_echo() -> bool {
    true
}

fn default_sync_receipts() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for TopicSection {
    fn default() -> Self {
        Self {
            name: default_topic_name(),
            user_id: default_user_id(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            echo: default_echo(),
            sync_receipts: default_sync_receipts(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl TopicConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Configuration for `name` acting as `user_id`, defaults elsewhere.
    pub fn for_topic(name: &str, user_id: &str) -> Self {
        Self {
            topic: TopicSection {
                name: name.to_string(),
                user_id: user_id.to_string(),
            },
            ..Default::default()
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}
