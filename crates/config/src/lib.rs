//! Configuration loading and validation for GoldenHammer.
//!
//! Loads settings from `goldenhammer.toml` in the working directory (or the
//! file named by `GOLDENHAMMER_CONFIG`) with environment variable overrides.
//! Every field has a default, so a missing file is not an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "goldenhammer.toml";

/// The root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HammerConfig {
    /// Cache storage settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Build execution settings
    #[serde(default)]
    pub build: BuildSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false, every source is rebuilt and nothing is recorded.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// When false, both stores live in memory for the life of the process.
    #[serde(default = "default_true")]
    pub persistent: bool,

    /// Root of the content-addressed data store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Root of the build-record store
    #[serde(default = "default_records_dir")]
    pub records_dir: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".goldenhammer/data")
}

fn default_records_dir() -> PathBuf {
    PathBuf::from(".goldenhammer/records")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persistent: true,
            data_dir: default_data_dir(),
            records_dir: default_records_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Directory asset source paths are resolved against
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    /// Sources built concurrently per batch (default: available parallelism)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            batch_size: None,
        }
    }
}

impl HammerConfig {
    /// Load configuration from `GOLDENHAMMER_CONFIG` or `./goldenhammer.toml`,
    /// then apply environment overrides:
    /// - `GOLDENHAMMER_CACHE_DIR` puts both stores beneath one directory
    /// - `GOLDENHAMMER_NO_CACHE` disables the build cache
    /// - `GOLDENHAMMER_BATCH_SIZE` sets the batch width
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("GOLDENHAMMER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));

        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides read through `lookup` (normally the process environment).
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = lookup("GOLDENHAMMER_CACHE_DIR") {
            let dir = PathBuf::from(dir);
            self.cache.data_dir = dir.join("data");
            self.cache.records_dir = dir.join("records");
        }

        if let Some(flag) = lookup("GOLDENHAMMER_NO_CACHE") {
            if is_truthy(&flag) {
                self.cache.enabled = false;
            }
        }

        if let Some(size) = lookup("GOLDENHAMMER_BATCH_SIZE") {
            let size = size.trim().parse::<usize>().map_err(|e| {
                ConfigError::ValidationError(format!("GOLDENHAMMER_BATCH_SIZE={size}: {e}"))
            })?;
            self.build.batch_size = Some(size);
        }

        self.validate()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.batch_size == Some(0) {
            return Err(ConfigError::ValidationError(
                "build.batch_size must be at least 1".into(),
            ));
        }

        if self.cache.enabled && self.cache.persistent && self.cache.data_dir == self.cache.records_dir {
            return Err(ConfigError::ValidationError(
                "cache.data_dir and cache.records_dir must differ".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
