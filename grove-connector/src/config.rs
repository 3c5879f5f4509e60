//! Configuration loading for Grove.
//!
//! Configuration is loaded from a TOML file (default: `grove.toml`).
//!
//! ```toml
//! [cache]
//! backend = "sqlite"
//! path = "grove.db"
//!
//! [lock]
//! duration_secs = 300
//!
//! [[connectors]]
//! name = "acme-audit"
//! kind = "local_file"
//! identity = "acme"
//! operation = "audit"
//! path = "audit.jsonl"
//! pointer = "timestamp"
//!
//! [[connectors.processors]]
//! name = "split"
//! path = "events"
//!
//! [[connectors.outputs]]
//! backend = "file"
//! directory = "out"
//! ```
//!
//! Keys other than the named fields are handed to the collector, processor
//! or output the entry names.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use grove_core::PathError;
use grove_types::TypesError;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Cache backend configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Execution lock configuration.
    #[serde(default)]
    pub lock: LockConfig,
    /// Collection targets.
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,
}

/// Cache backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Backend name: `sqlite` or `memory` (default: sqlite).
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    /// Path to the SQLite database (default: grove.db).
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

/// Execution lock configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// Lock lifetime in seconds (default: 300).
    #[serde(default = "default_lock_duration_secs")]
    pub duration_secs: u64,
}

/// One collection target.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    /// Unique name, used on the command line.
    pub name: String,
    /// Collector implementation.
    pub kind: String,
    /// Upstream tenant identity.
    pub identity: String,
    /// Operation (log stream) name.
    pub operation: String,
    /// Processing stages, applied in order.
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
    /// Destinations.
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
    /// Collector settings.
    #[serde(flatten)]
    pub settings: toml::Table,
}

/// One pipeline stage.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// Processor implementation.
    pub name: String,
    /// Processor settings.
    #[serde(flatten)]
    pub settings: toml::Table,
}

/// One destination.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Output implementation.
    pub backend: String,
    /// Output settings.
    #[serde(flatten)]
    pub settings: toml::Table,
}

// Default value functions
fn default_cache_backend() -> String {
    "sqlite".to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("grove.db")
}

fn default_lock_duration_secs() -> u64 {
    300 // 5 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            path: default_cache_path(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_lock_duration_secs(),
        }
    }
}

impl LockConfig {
    /// Lock lifetime.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl Config {
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

    /// Look up a connector by name.
    pub fn connector(&self, name: &str) -> Option<&ConnectorConfig> {
        self.connectors.iter().find(|c| c.name == name)
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
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A backend, collector or processor name is not known.
    #[error("unknown {what} '{name}'")]
    Unknown {
        /// What was being looked up.
        what: &'static str,
        /// The name given.
        name: String,
    },
    /// A required setting is missing or has the wrong type.
    #[error("{owner}: setting '{key}' {problem}")]
    Setting {
        /// Entry the setting belongs to.
        owner: String,
        /// Setting name.
        key: String,
        /// What is wrong with it.
        problem: String,
    },
    /// Two connectors share a name.
    #[error("duplicate connector name '{0}'")]
    DuplicateConnector(String),
    /// An identity or log order is invalid.
    #[error("{0}")]
    Invalid(#[from] TypesError),
    /// A field path is invalid.
    #[error("invalid field path: {0}")]
    Path(#[from] PathError),
}
