//! Configuration management
//!
//! This module handles loading, saving, and migrating the objcat configuration
//! file. The configuration file is stored in TOML format at
//! ~/.config/objcat/config.toml, or under `$OBJCAT_CONFIG_DIR` when set.
//!
//! PROTECTED FILE: Changes to schema_version require migration support.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::StorageConfig;

/// Current configuration schema version
///
/// IMPORTANT: Bumping this version requires:
/// 1. Adding a migration in `ConfigManager::migrate`
/// 2. Updating migration tests
/// 3. Marking the change as BREAKING
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "OBJCAT_CONFIG_DIR";

/// Default part size for ranged reads: 50 MiB
pub const DEFAULT_PART_SIZE: u64 = 50 * 1024 * 1024;

/// Default number of in-flight range requests per object
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default output format
const DEFAULT_OUTPUT: &str = "human";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Storage endpoint settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Default settings for CLI behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Part size in bytes for ranged reads
    #[serde(default = "default_part_size")]
    pub part_size: u64,

    /// Maximum in-flight range requests per object
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_part_size() -> u64 {
    DEFAULT_PART_SIZE
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            part_size: default_part_size(),
            concurrency: default_concurrency(),
        }
    }
}

impl Defaults {
    /// Whether JSON output is the configured default
    pub fn json_output(&self) -> bool {
        self.output.eq_ignore_ascii_case("json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("could not determine config directory".into()))?
                .join("objcat"),
        };
        Ok(Self {
            config_path: config_dir.join("config.toml"),
        })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// An older schema version is migrated and written back.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            let from = config.schema_version;
            config = self.migrate(config)?;
            self.save(&config)?;
            tracing::debug!(from, to = SCHEMA_VERSION, "migrated config file");
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "configuration file version {} is newer than supported version {}. Please upgrade objcat.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        // Credentials may live in this file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, config: Config) -> Result<Config> {
        let mut config = config;
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}
