//! Configuration management for session-hub.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Args;
use crate::driver::{CacheDriver, DriverRegistry, FileDriver, MemoryCache, DEFAULT_INDEX_KEY};
use crate::session::SessionConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session settings.
    pub session: SessionSection,
    /// Driver wiring.
    pub drivers: DriversSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Session configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Session (cookie) name.
    pub name: Option<String>,
    /// Save path handed to drivers on open.
    pub save_path: String,
    /// Max session lifetime for gc, in seconds.
    pub gc_max_lifetime: u64,
    /// Reject generated ids that already have a record.
    pub unique_ids: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            name: None,
            save_path: String::new(),
            gc_max_lifetime: 86_400,
            unique_ids: false,
        }
    }
}

/// Driver configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriversSection {
    /// Name of the default driver.
    pub default: String,
    /// File driver settings.
    pub file: FileSection,
    /// Cache driver settings.
    pub cache: CacheSection,
}

impl Default for DriversSection {
    fn default() -> Self {
        Self {
            default: "file".to_string(),
            file: FileSection::default(),
            cache: CacheSection::default(),
        }
    }
}

/// File driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSection {
    /// Register the file driver.
    pub enabled: bool,
    /// Session directory.
    pub dir: PathBuf,
}

impl Default for FileSection {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: std::env::temp_dir().join("session-hub"),
        }
    }
}

/// Cache driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Register the cache driver.
    pub enabled: bool,
    /// Reserved key holding the shadow index.
    pub index_key: String,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: false,
            index_key: DEFAULT_INDEX_KEY.to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("SESSION_HUB_DIR") {
            if !dir.is_empty() {
                self.drivers.file.dir = PathBuf::from(dir);
            }
        }

        if let Ok(name) = std::env::var("SESSION_HUB_DEFAULT_DRIVER") {
            if !name.is_empty() {
                self.drivers.default = name;
            }
        }

        if let Ok(level) = std::env::var("SESSION_HUB_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref dir) = args.dir {
            self.drivers.file.dir = dir.clone();
        }

        if let Some(secs) = args.max_lifetime {
            self.session.gc_max_lifetime = secs;
        }

        if let Some(ref name) = args.default_driver {
            self.drivers.default = name.clone();
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Session settings for the coordinator.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            name: self.session.name.clone(),
            save_path: self.session.save_path.clone(),
            gc_max_lifetime: self.session.gc_max_lifetime,
            unique_ids: self.session.unique_ids,
            ..SessionConfig::default()
        }
    }

    /// Build the enabled drivers, file first, and select the default.
    ///
    /// The cache driver is backed by an in-process [`MemoryCache`], so its
    /// contents live only as long as the returned registry.
    pub fn build_registry(&self) -> crate::Result<DriverRegistry> {
        let mut registry = DriverRegistry::new();

        if self.drivers.file.enabled {
            registry.register("file", FileDriver::new(&self.drivers.file.dir))?;
        }

        if self.drivers.cache.enabled {
            let driver = CacheDriver::detect(vec![
                Box::new(MemoryCache::named("memory")),
            ])?
            .with_index_key(&self.drivers.cache.index_key)?;
            registry.register("cache", driver)?;
        }

        registry.set_default(&self.drivers.default)?;
        Ok(registry)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error.
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}
