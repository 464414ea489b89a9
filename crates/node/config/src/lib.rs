//! Engine configuration.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default chain identifier for local development.
pub const DEFAULT_CHAIN_ID: &str = "urna-dev";

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/urna";

/// Default capacity of the checked-vote cache.
pub const DEFAULT_VOTE_CACHE_SIZE: usize = 50_000;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config at {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// TOML parse or serialize error.
    #[error("toml error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialize error.
    #[error("toml error: {0}")]
    TomlEmit(#[from] toml::ser::Error),

    /// JSON parse or serialize error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Chain identifier, written into every header.
    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    /// Data directory for the persistent state store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Capacity of the checked-vote cache.
    #[serde(default = "default_vote_cache_size")]
    pub vote_cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            vote_cache_size: DEFAULT_VOTE_CACHE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file path, auto-detecting format by
    /// extension. `None` returns the defaults. `.json` parses as JSON,
    /// everything else as TOML.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else { return Ok(Self::default()) };
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read { path: path.into(), source: e })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&contents)?),
            _ => Ok(toml::from_str(&contents)?),
        }
    }

    /// Serialize to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn default_chain_id() -> String {
    DEFAULT_CHAIN_ID.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

const fn default_vote_cache_size() -> usize {
    DEFAULT_VOTE_CACHE_SIZE
}
