//! Recorder configuration
//!
//! Read once before [`crate::recorder::Recorder::init`]. Every field carries a
//! default, so an empty TOML document yields a usable local-file setup:
//!
//! ```toml
//! logLevel = "debug"
//! defaultTag = "TvT"
//!
//! [storage]
//! type = "relational"
//!
//! [storage.relational]
//! database = "/srv/ocap/ocap.db"
//! drainInterval = "2s"
//!
//! [storage.sqlite]
//! dumpInterval = "3m"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level recorder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Output format for log lines
    pub log_format: LogFormat,

    /// Tag stamped on missions that arrive without one
    pub default_tag: String,

    /// Directory receiving the recorder log file
    pub logs_dir: PathBuf,

    /// Backend selection and per-backend settings
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            default_tag: "Op".to_string(),
            logs_dir: PathBuf::from("./ocaplogs"),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.relational.drain_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "storage.relational.drainInterval must be greater than zero".to_string(),
            ));
        }
        if self.storage.sqlite.dump_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "storage.sqlite.dumpInterval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Which backend the router builds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StorageKind {
    Relational,
    #[default]
    LocalFile,
    Null,
    /// Kept verbatim so the router can reject it at init
    Unknown(String),
}

impl From<String> for StorageKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "relational" | "postgres" | "postgresql" | "sqlite" => Self::Relational,
            "local-file" | "local_file" | "memory" => Self::LocalFile,
            "null" | "none" => Self::Null,
            _ => Self::Unknown(value),
        }
    }
}

impl From<StorageKind> for String {
    fn from(kind: StorageKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relational => f.write_str("relational"),
            Self::LocalFile => f.write_str("local-file"),
            Self::Null => f.write_str("null"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    pub memory: MemoryStorageConfig,
    pub sqlite: SqliteStorageConfig,
    pub relational: RelationalConfig,
}

/// Local-file output settings, shared by the dump backend and the
/// relational fallback snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryStorageConfig {
    pub output_dir: PathBuf,
    pub compress_output: bool,
}

impl Default for MemoryStorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./recordings"),
            compress_output: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SqliteStorageConfig {
    /// Period between snapshots of the in-memory fallback store
    #[serde(with = "duration_str")]
    pub dump_interval: Duration,
}

impl Default for SqliteStorageConfig {
    fn default() -> Self {
        Self {
            dump_interval: Duration::from_secs(180),
        }
    }
}

/// Relational store connection settings.
///
/// The bundled store is SQLite, so `database` names the database file. The
/// network fields are kept for DSN-style deployments and only appear in logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelationalConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,

    /// Batched writer tick period
    #[serde(with = "duration_str")]
    pub drain_interval: Duration,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "ocap".to_string(),
            drain_interval: Duration::from_secs(2),
        }
    }
}

impl RelationalConfig {
    /// In-memory database marker accepted in `database`.
    pub const IN_MEMORY: &'static str = ":memory:";

    /// Path of the SQLite database file, `None` for an in-memory store.
    #[must_use]
    pub fn database_path(&self) -> Option<PathBuf> {
        if self.database.is_empty() || self.database == Self::IN_MEMORY {
            return None;
        }
        let path = PathBuf::from(&self.database);
        if path.extension().is_some() {
            Some(path)
        } else {
            Some(path.with_extension("db"))
        }
    }

    /// Connection target for log lines. Never includes the password.
    #[must_use]
    pub fn display_target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

/// `"250ms"`, `"2s"`, `"3m"`, `"1h"` durations.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| ConfigError::ParseFailed(format!("duration {raw:?} has no unit")))?;
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| ConfigError::ParseFailed(format!("invalid duration {raw:?}")))?;
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(ConfigError::ParseFailed(format!(
            "unknown duration unit {unit:?} in {raw:?}"
        ))),
    }
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 3_600_000 == 0 && millis > 0 {
        format!("{}h", millis / 3_600_000)
    } else if millis % 60_000 == 0 && millis > 0 {
        format!("{}m", millis / 60_000)
    } else if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{millis}ms")
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
