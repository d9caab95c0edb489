//! Application configuration.
//!
//! Storage backend plus the stores to enrol, loaded from YAML files and
//! environment variables.

mod storage;

pub use storage::{PostgresConfig, SqliteConfig, StorageConfig, StorageType};

use serde::Deserialize;

use crate::selector::Selector;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "TIDEMARK_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "TIDEMARK";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "TIDEMARK_LOG";
/// Name of the store enrolled when none are configured.
pub const DEFAULT_STORE_NAME: &str = "sql";

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Store configured more than once: {0}")]
    DuplicateStore(String),
}

/// One store and the selector scope it is concerned with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreEntry {
    pub name: String,
    /// Selector in its textual form, e.g. `"$orders/*"`.
    pub concerning: Selector,
    /// Backend of this store; the top-level `storage` when absent.
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

impl StoreEntry {
    pub fn new(name: impl Into<String>, concerning: Selector) -> Self {
        Self {
            name: name.into(),
            concerning,
            storage: None,
        }
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = Some(storage);
        self
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Stores to enrol, in routing order.
    pub stores: Vec<StoreEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            stores: vec![StoreEntry::new(DEFAULT_STORE_NAME, Selector::all())],
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Backend configuration used by `entry`.
    pub fn storage_for<'a>(&'a self, entry: &'a StoreEntry) -> &'a StorageConfig {
        entry.storage.as_ref().unwrap_or(&self.storage)
    }

    /// Reject configurations naming the same store twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, entry) in self.stores.iter().enumerate() {
            if self.stores[..i].iter().any(|other| other.name == entry.name) {
                return Err(ConfigError::DuplicateStore(entry.name.clone()));
            }
        }
        Ok(())
    }
}
