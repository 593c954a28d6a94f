use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 3600);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid retention window '{value}': {source}")]
    Retention {
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("could not determine a data directory for the default database path")]
    NoDataDir,

    #[error("cannot create data directory: {0}")]
    DataDir(#[source] std::io::Error),
}

/// Resource kind a source collects; selects the collector module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Compute,
    LoadBalancer,
    ObjectStorage,
    Dns,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Compute => "compute",
            SourceKind::LoadBalancer => "load-balancer",
            SourceKind::ObjectStorage => "object-storage",
            SourceKind::Dns => "dns",
        }
    }
}

/// One configured inventory source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source name, the identity under which snapshots are versioned.
    pub name: String,
    pub kind: SourceKind,
    /// Export command argv; first element is the program, rest are arguments.
    pub command: Vec<String>,
    /// Default project stamped on records that carry none.
    pub project: Option<String>,
    /// Default cluster/zone stamped on records that carry none.
    pub cluster: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    dsn: Option<String>,
    retention: Option<String>,
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

pub struct Config {
    /// SQLite database path.
    pub dsn: String,
    pub retention: Duration,
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load from an explicit path, or from the default location if present.
    /// A missing default config yields a storage-only config so the status,
    /// report, diff and prune commands work without one.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let raw = if let Some(p) = path {
            read_raw(p)?
        } else if let Some(p) = default_config_path().filter(|p| p.exists()) {
            read_raw(&p)?
        } else {
            RawConfig::default()
        };

        resolve(raw)
    }

    /// Retention window in whole days, as consumed by the pruner.
    pub fn retention_days(&self) -> u64 {
        self.retention.as_secs() / 86_400
    }
}

fn read_raw(path: &Path) -> Result<RawConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn resolve(raw: RawConfig) -> Result<Config, ConfigError> {
    let retention = match &raw.retention {
        Some(value) => humantime::parse_duration(value).map_err(|e| ConfigError::Retention {
            value: value.clone(),
            source: e,
        })?,
        None => DEFAULT_RETENTION,
    };

    let dsn = match raw.dsn {
        Some(dsn) => dsn,
        None => default_db_path()?.to_string_lossy().into_owned(),
    };

    Ok(Config {
        dsn,
        retention,
        sources: raw.sources,
    })
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "muster")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Default database path (~/.local/share/muster/inventory.db or platform equivalent)
fn default_db_path() -> Result<PathBuf, ConfigError> {
    let data_dir = directories::ProjectDirs::from("", "", "muster")
        .ok_or(ConfigError::NoDataDir)?
        .data_dir()
        .to_path_buf();

    std::fs::create_dir_all(&data_dir).map_err(ConfigError::DataDir)?;
    Ok(data_dir.join("inventory.db"))
}
