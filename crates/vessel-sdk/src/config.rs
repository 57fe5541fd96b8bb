use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vessel_keys::KeyStrategy;
use vessel_policy::{PolicyConfig, PolicyError};
use vessel_store::BackendError;

/// Errors raised while loading or applying a [`StorageConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid policy section: {0}")]
    Policy(#[from] PolicyError),

    #[error("backend could not be opened: {0}")]
    Backend(#[from] BackendError),
}

/// Which backend driver to use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Process-local, in-memory storage.
    Memory {
        /// Let the backend assign keys instead of the key strategy.
        #[serde(default)]
        backend_keys: bool,
    },
    /// Local filesystem storage under `root`.
    Fs { root: PathBuf },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Memory {
            backend_keys: false,
        }
    }
}

/// Configuration for a [`BlobStorage`](crate::BlobStorage).
///
/// ```toml
/// name = "media"
/// events_enabled = true
///
/// [backend]
/// kind = "fs"
/// root = "/var/lib/vessel"
///
/// [keys]
/// kind = "sequential"
/// width = 8
///
/// [policy]
/// redact = ["tenant"]
/// [policy.inject]
/// tenant = "t1"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage name carried by every event.
    pub name: String,
    pub backend: BackendConfig,
    pub keys: KeyStrategy,
    /// When `false`, events are dropped by a no-op registry.
    pub events_enabled: bool,
    pub policy: PolicyConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            backend: BackendConfig::default(),
            keys: KeyStrategy::default(),
            events_enabled: true,
            policy: PolicyConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check the parts that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("storage name must not be blank".into()));
        }
        if let BackendConfig::Fs { root } = &self.backend {
            if root.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("fs backend root must not be empty".into()));
            }
        }
        if let KeyStrategy::Composite { parts } = &self.keys {
            if parts.is_empty() {
                return Err(ConfigError::Invalid("composite key strategy needs parts".into()));
            }
        }
        Ok(())
    }
}
