//! # Configuration
//!
//! Repository configuration loaded with the `config` crate.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. An optional TOML (or any `config`-supported format) file
//! 3. Environment variables prefixed `AGGREGATE_REPO__`, nested with `__`
//!
//! A `.env` file in the working directory is loaded first with `dotenvy`.
//!
//! # Examples
//!
//! ```
//! use aggregate_repository::config::RepositoryConfig;
//! use aggregate_repository::infrastructure::persistence::PersistenceStrategy;
//!
//! let config = RepositoryConfig::from_toml_str(r#"
//!     strategy = "snapshot_diff"
//!
//!     [database]
//!     url = "postgres://localhost/books"
//! "#).unwrap();
//!
//! assert_eq!(config.strategy, PersistenceStrategy::SnapshotDiff);
//! assert_eq!(config.database.unwrap().max_connections, 5);
//! ```

use crate::infrastructure::persistence::strategy::PersistenceStrategy;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "AGGREGATE_REPO";

/// Default pool size.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default pool acquire timeout in seconds.
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Default tracing filter directive.
const DEFAULT_LOG_FILTER: &str = "info";

/// Error raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Values were read but are not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info,aggregate_repository=debug`.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL.
    pub url: String,
    /// Maximum pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_acquire_timeout_secs() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_SECS
}

impl DatabaseConfig {
    /// Creates settings for `url` with default pool limits.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Persistence strategy used by repositories.
    pub strategy: PersistenceStrategy,
    /// Logging settings.
    pub log: LogConfig,
    /// Database settings; `None` when only in-memory storage is used.
    pub database: Option<DatabaseConfig>,
}

impl RepositoryConfig {
    /// Loads configuration from `.env`, an optional file, and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the file is missing or a value has
    /// the wrong type, and `ConfigError::Invalid` if validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // a missing .env file is not an error
        let _ = dotenvy::dotenv();

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        Self::finish(builder.add_source(environment()))
    }

    /// Parses configuration from a TOML string, without the environment.
    ///
    /// # Errors
    ///
    /// See [`RepositoryConfig::load`].
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::finish(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    /// Checks values that deserialize fine but cannot work.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log.filter must not be empty".into()));
        }
        if let Some(database) = &self.database {
            if database.url.trim().is_empty() {
                return Err(ConfigError::Invalid("database.url must not be empty".into()));
            }
            if database.max_connections == 0 {
                return Err(ConfigError::Invalid(
                    "database.max_connections must be at least 1".into(),
                ));
            }
        }
        Ok(())
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
