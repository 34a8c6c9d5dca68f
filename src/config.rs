//! Configuration module for the sharding engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `VS_` and use double underscores
//! to separate nested levels:
//! - `VS_PLACEMENT__STRATEGY=hash` sets `placement.strategy`
//! - `VS_SEARCH__DEFAULT_LIMIT=5` sets `search.default_limit`
//! - `VS_LOGGING__LEVEL=debug` sets `logging.level`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::shard::{ShardDescriptor, StrategyKind};

/// Directory holding settings and the default snapshot.
pub const CONFIG_DIR: &str = ".vecshard";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Where the CLI keeps the registry between invocations
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Placement settings
    #[serde(default)]
    pub placement: PlacementConfig,

    /// Search defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Shards registered when no snapshot exists yet
    #[serde(default)]
    pub shards: Vec<ShardConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PlacementConfig {
    /// Strategy for fresh inserts: "round-robin", "hash" or "range"
    #[serde(default)]
    pub strategy: StrategyKind,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Result count when the caller gives no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Minimum cosine score when the caller gives none
    #[serde(default)]
    pub min_score: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Max level for the CLI's log output: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ShardConfig {
    pub id: String,

    /// Display label, defaults to the id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Maximum vectors, 0 for unlimited
    #[serde(default)]
    pub capacity: usize,
}

impl ShardConfig {
    pub fn to_descriptor(&self) -> ShardDescriptor {
        let name = self.name.clone().unwrap_or_else(|| self.id.clone());
        ShardDescriptor::new(self.id.as_str(), name, self.capacity)
    }
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("snapshot.json")
}
fn default_limit() -> usize {
    10
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            snapshot_path: default_snapshot_path(),
            placement: PlacementConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
            shards: Vec::new(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            min_score: 0.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::figment(config_path).extract().map_err(Box::new)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref().to_path_buf())
            .extract()
            .map_err(Box::new)
    }

    fn figment(config_path: PathBuf) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels; single underscores
            // stay part of the field name
            .merge(Env::prefixed("VS_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Find the settings file by looking for a .vecshard directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join("settings.toml"))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(
        dir: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.as_ref().join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r#"# vecshard configuration

# Version of the configuration schema
version = 1

# Where the registry is saved between CLI invocations
snapshot_path = ".vecshard/snapshot.json"

[placement]
# Strategy for fresh inserts: "round-robin", "hash" or "range"
# Switching only affects future inserts; run a rebalance to redistribute.
strategy = "round-robin"

[search]
# Number of results when --limit is not given
default_limit = 10

# Minimum cosine similarity (-1.0 to 1.0) when --min-score is not given
min_score = 0.0

[logging]
# error, warn, info, debug or trace (--verbose forces debug)
level = "warn"

# Shards registered on first use, before any snapshot exists.
# capacity = 0 means unlimited.
#
# [[shards]]
# id = "shard-a"
# name = "Primary"
# capacity = 10000
#
# [[shards]]
# id = "shard-b"
# capacity = 10000
"#;

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}
