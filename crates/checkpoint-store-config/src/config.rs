// crates/checkpoint-store-config/src/config.rs
// ============================================================================
// Module: Checkpoint Store Configuration
// Description: Configuration loading and validation for checkpoint storage.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: checkpoint-store-core, checkpoint-store-file, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The `[storage]` table selects a backend by `type`. Missing or invalid
//! configuration fails closed rather than falling back to a default backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use checkpoint_store_core::Locker;
use checkpoint_store_core::LockerChoice;
use checkpoint_store_core::StateStorage;
use checkpoint_store_file::FileStorage;
use checkpoint_store_file::FileStorageConfig;
use checkpoint_store_s3::normalize_prefix;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "checkpoint-store.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CHECKPOINT_STORE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Top-Level Config
// ============================================================================

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointStoreConfig {
    /// Storage backend selection.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl CheckpointStoreConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// An explicit `path` wins, then [`CONFIG_ENV_VAR`], then
    /// `checkpoint-store.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()
    }
}

// ============================================================================
// SECTION: Storage Config
// ============================================================================

/// Locker selection expressible in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockerMode {
    /// Use the backend default locker.
    #[default]
    Default,
    /// Perform no locking.
    None,
}

impl LockerMode {
    /// Converts the mode into a construction-time choice.
    #[must_use]
    pub fn to_choice(self) -> LockerChoice {
        match self {
            Self::Default => LockerChoice::Default,
            Self::None => LockerChoice::Disabled,
        }
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Local file backend.
    File(FileBackendConfig),
    /// Object-store backend.
    ObjectStore(ObjectStoreConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::File(FileBackendConfig::default())
    }
}

impl StorageConfig {
    /// Validates storage configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when storage settings are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::File(config) => config.validate(),
            Self::ObjectStore(config) => config.validate(),
        }
    }

    /// Builds the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation or backend construction fails.
    pub fn build(&self) -> Result<Arc<dyn StateStorage>, ConfigError> {
        self.build_inner(None)
    }

    /// Builds the configured backend with a caller-supplied locker.
    ///
    /// The locker replaces whatever `locker` mode the file selects. This is
    /// the only way to give the object store a locker.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation or backend construction fails.
    pub fn build_with_locker(
        &self,
        locker: Arc<dyn Locker>,
    ) -> Result<Arc<dyn StateStorage>, ConfigError> {
        self.build_inner(Some(locker))
    }

    /// Validates, then constructs the backend.
    fn build_inner(
        &self,
        locker: Option<Arc<dyn Locker>>,
    ) -> Result<Arc<dyn StateStorage>, ConfigError> {
        self.validate()?;
        match self {
            Self::File(config) => {
                let choice = locker.map_or_else(|| config.locker.to_choice(), LockerChoice::Custom);
                let options = FileStorageConfig::new(config.resolved_dir()).with_locker(choice);
                let storage =
                    FileStorage::new(options).map_err(|err| ConfigError::Storage(err.to_string()))?;
                Ok(Arc::new(storage))
            }
            Self::ObjectStore(config) => {
                let choice = locker.map_or(LockerChoice::Disabled, LockerChoice::Custom);
                build_object_store(config, choice)
            }
        }
    }
}

/// Local file backend configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileBackendConfig {
    /// Directory holding envelopes; defaults to the system temp directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Locker selection.
    #[serde(default)]
    pub locker: LockerMode,
}

impl FileBackendConfig {
    /// Returns the configured directory or the system temp directory.
    #[must_use]
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(env::temp_dir)
    }

    /// Validates file backend configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("storage.dir must be non-empty".to_string()));
            }
            validate_path(dir)?;
        }
        Ok(())
    }
}

/// Supported object-store providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStoreProvider {
    /// Amazon S3 compatible object storage.
    S3,
}

/// Object-store backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectStoreConfig {
    /// Provider selection for the object store.
    pub provider: ObjectStoreProvider,
    /// Bucket name.
    pub bucket: String,
    /// Optional region (defaults to environment).
    #[serde(default)]
    pub region: Option<String>,
    /// Optional object-store endpoint (S3-compatible).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Optional object-name prefix inside the bucket.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Force path-style addressing (S3-compatible).
    #[serde(default)]
    pub force_path_style: bool,
    /// Allow non-TLS endpoints (explicit opt-in).
    #[serde(default)]
    pub allow_http: bool,
    /// Locker selection; only `none` is accepted.
    #[serde(default = "default_object_store_locker")]
    pub locker: LockerMode,
}

/// Object stores have no default locker.
const fn default_object_store_locker() -> LockerMode {
    LockerMode::None
}

impl ObjectStoreConfig {
    /// Validates object-store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when object-store settings are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.bucket must be set".to_string()));
        }
        if let Some(endpoint) = &self.endpoint {
            let trimmed = endpoint.trim();
            if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
                return Err(ConfigError::Invalid(
                    "storage.endpoint must include http:// or https://".to_string(),
                ));
            }
            if trimmed.starts_with("http://") && !self.allow_http {
                return Err(ConfigError::Invalid(
                    "storage.endpoint uses http:// without allow_http".to_string(),
                ));
            }
        }
        if let Some(prefix) = &self.prefix {
            normalize_prefix(prefix)
                .map_err(|err| ConfigError::Invalid(format!("storage.prefix: {err}")))?;
        }
        if self.locker == LockerMode::Default {
            return Err(ConfigError::Invalid(
                "object_store has no default locker; set locker = \"none\" or supply one in code"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Builds the S3-backed object storage.
#[cfg(feature = "s3")]
fn build_object_store(
    config: &ObjectStoreConfig,
    locker: LockerChoice,
) -> Result<Arc<dyn StateStorage>, ConfigError> {
    use checkpoint_store_s3::ObjectStorage;
    use checkpoint_store_s3::S3Bucket;
    use checkpoint_store_s3::S3BucketConfig;

    let bucket = S3Bucket::connect(&S3BucketConfig {
        bucket: config.bucket.clone(),
        region: config.region.clone(),
        endpoint: config.endpoint.as_deref().map(str::trim).map(str::to_string),
        force_path_style: config.force_path_style,
    })
    .map_err(|err| ConfigError::Storage(err.to_string()))?;
    let storage = ObjectStorage::new(Arc::new(bucket), locker)
        .with_prefix(config.prefix.as_deref().unwrap_or(""))
        .map_err(|err| ConfigError::Storage(err.to_string()))?;
    Ok(Arc::new(storage))
}

/// Object storage needs the `s3` feature.
#[cfg(not(feature = "s3"))]
fn build_object_store(
    _config: &ObjectStoreConfig,
    _locker: LockerChoice,
) -> Result<Arc<dyn StateStorage>, ConfigError> {
    Err(ConfigError::Invalid(
        "object_store storage requires the checkpoint-store-config `s3` feature".to_string(),
    ))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Backend construction failed.
    #[error("storage setup error: {0}")]
    Storage(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("path component too long".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn explicit_path_wins() {
        let resolved = resolve_path(Some(Path::new("custom.toml"))).unwrap();
        assert_eq!(resolved, PathBuf::from("custom.toml"));
    }

    #[test]
    fn long_path_component_is_rejected() {
        let long = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        let err = validate_path(Path::new(&long)).unwrap_err();
        assert!(err.to_string().contains("component too long"));
    }

    #[test]
    fn oversized_text_is_rejected() {
        let content = format!("# {}", "x".repeat(MAX_CONFIG_FILE_SIZE));
        let err = CheckpointStoreConfig::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("size limit"));
    }

    #[test]
    fn locker_mode_maps_to_choice() {
        assert!(matches!(LockerMode::Default.to_choice(), LockerChoice::Default));
        assert!(matches!(LockerMode::None.to_choice(), LockerChoice::Disabled));
    }
}
