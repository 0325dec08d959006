use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::LogFormat;

/// How the engine treats line numbers that no longer fit the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApplyPolicy {
    /// Clamp DELETE/REPLACE ranges that run past the end of the file instead
    /// of rejecting them
    pub clamp_end_line: bool,
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self {
            clamp_end_line: true,
        }
    }
}

impl ApplyPolicy {
    /// Reject any range that reaches past the end of the file
    pub fn strict() -> Self {
        Self {
            clamp_end_line: false,
        }
    }
}

/// File persistence settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Copy each file to `<name>.bak` before overwriting it
    pub backup: bool,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Runtime configuration loaded from TOML
///
/// Every section is optional; missing keys fall back to their defaults:
///
/// ```toml
/// [policy]
/// clamp_end_line = true
///
/// [files]
/// backup = false
///
/// [logging]
/// filter = "info"
/// format = "compact"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub policy: ApplyPolicy,
    pub files: FileConfig,
    pub logging: LoggingConfig,
}

/// Errors encountered while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
