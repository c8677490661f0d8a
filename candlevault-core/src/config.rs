//! Project directory and TOML configuration.
//!
//! Layout: `{project_dir}/config.toml`, default storage at `{project_dir}/storage`.
//! The project dir is `$HOME/.candlevault` unless overridden explicitly or via
//! `CANDLEVAULT_HOME`. The loaded `Config` is passed by value into the store and
//! source constructors; nothing reads it from global state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the project directory.
pub const HOME_ENV: &str = "CANDLEVAULT_HOME";

/// File name of the configuration inside the project directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Default bound on in-flight ingestion work units.
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;

const PROJECT_DIR_NAME: &str = ".candlevault";
const STORAGE_DIR_NAME: &str = "storage";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine home directory; set {HOME_ENV} or pass --home")]
    NoHomeDir,

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the daily candle store.
    pub storage_dir: PathBuf,

    /// Upper bound on concurrent fetch+aggregate+write units during ingestion.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Per-exchange source settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub bybit: BybitConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BybitConfig {
    #[serde(default = "default_bybit_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self {
            base_url: default_bybit_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_bybit_base_url() -> String {
    crate::data::bybit::BYBIT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Default configuration rooted at the given storage directory.
    pub fn with_storage(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            sources: SourcesConfig::default(),
        }
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Render as TOML, the same text `save` writes.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the config, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        let tmp = path.with_extension("toml.tmp");
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        fs::write(&tmp, content).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            ConfigError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage_dir is empty".into()));
        }
        if self.sources.bybit.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("sources.bybit.base_url is empty".into()));
        }
        Ok(())
    }
}

/// Result of opening the project directory.
#[derive(Debug)]
pub struct Bootstrap {
    pub config: Config,
    /// True when this call created the project directory and default config.
    pub created: bool,
}

/// The project directory holding `config.toml` and, by default, the store.
#[derive(Debug, Clone)]
pub struct ProjectDir {
    root: PathBuf,
}

impl ProjectDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve from an explicit path, then `CANDLEVAULT_HOME`, then `$HOME/.candlevault`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(root) = explicit {
            return Ok(Self::new(root));
        }
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(root)));
        }
        dirs::home_dir()
            .map(|home| Self::new(home.join(PROJECT_DIR_NAME)))
            .ok_or(ConfigError::NoHomeDir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn default_storage_dir(&self) -> PathBuf {
        self.root.join(STORAGE_DIR_NAME)
    }

    /// Load the config, creating the project dir, storage dir and a default
    /// config on first use. The configured storage dir is created if missing.
    pub fn bootstrap(&self) -> Result<Bootstrap, ConfigError> {
        let config_path = self.config_path();
        let created = !config_path.exists();

        let config = if created {
            fs::create_dir_all(&self.root).map_err(|source| ConfigError::Write {
                path: self.root.clone(),
                source,
            })?;
            let config = Config::with_storage(self.default_storage_dir());
            config.save(&config_path)?;
            tracing::info!(path = %config_path.display(), "created default configuration");
            config
        } else {
            Config::from_file(&config_path)?
        };

        fs::create_dir_all(&config.storage_dir).map_err(|source| ConfigError::Write {
            path: config.storage_dir.clone(),
            source,
        })?;

        Ok(Bootstrap { config, created })
    }

    /// Persist a new storage directory and return the updated config.
    pub fn set_storage_dir(&self, storage_dir: impl Into<PathBuf>) -> Result<Config, ConfigError> {
        let mut config = self.bootstrap()?.config;
        config.storage_dir = storage_dir.into();
        config.validate()?;
        config.save(&self.config_path())?;
        Ok(config)
    }
}
