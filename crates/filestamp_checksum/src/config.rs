//! Checksum cache configuration.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};

use crate::ChecksumError;

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/checksum-config.json");
static CONFIG_SCHEMA: OnceLock<Option<Validator>> = OnceLock::new();

/// Environment variable naming the persisted cache file for the shared cache.
pub const CACHE_FILE_ENV: &str = "FILESTAMP_CHECKSUM_CACHE";

/// Configuration for a [`crate::ChecksumCache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecksumConfig {
    /// File the cache is loaded from at construction and saved back to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,

    /// How long to wait before re-checking a cache file that is momentarily
    /// missing (another process may be replacing it).
    #[serde(default = "default_reload_retry_delay_ms")]
    pub reload_retry_delay_ms: u64,

    /// Name given to the background digest worker thread.
    #[serde(default = "default_worker_thread_name")]
    pub worker_thread_name: String,
}

fn default_reload_retry_delay_ms() -> u64 {
    1000
}

fn default_worker_thread_name() -> String {
    "filestamp-checksum".to_string()
}

impl ChecksumConfig {
    /// Creates a configuration with no backing cache file.
    pub fn new() -> Self {
        Self {
            cache_file: None,
            reload_retry_delay_ms: default_reload_retry_delay_ms(),
            worker_thread_name: default_worker_thread_name(),
        }
    }

    /// Sets the backing cache file.
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    /// Sets the missing-file retry delay.
    pub fn with_reload_retry_delay(mut self, delay: Duration) -> Self {
        self.reload_retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn reload_retry_delay(&self) -> Duration {
        Duration::from_millis(self.reload_retry_delay_ms)
    }

    /// Loads configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ChecksumError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ChecksumError::NotFound(path.to_path_buf()),
            _ => ChecksumError::config(format!("Failed to read config: {}", e)),
        })?;

        Self::from_json(&content)
    }

    /// Parses configuration from JSON string with schema validation.
    pub fn from_json(json: &str) -> Result<Self, ChecksumError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ChecksumError::config(format!("Invalid JSON: {}", e)))?;

        let schema = CONFIG_SCHEMA
            .get_or_init(|| {
                let schema_json: serde_json::Value = serde_json::from_str(SCHEMA_JSON).ok()?;
                Validator::new(&schema_json).ok()
            })
            .as_ref()
            .ok_or_else(|| ChecksumError::config("Embedded config schema is invalid"))?;

        if let Err(e) = schema.validate(&value) {
            let error_msg = format!("{} at {}", e, e.instance_path());
            return Err(ChecksumError::config(format!(
                "Config validation failed: {}",
                error_msg
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| ChecksumError::config(format!("Invalid config: {}", e)))
    }

    /// Builds the default configuration, taking the cache file from
    /// [`CACHE_FILE_ENV`] when it is set.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var_os(key))
    }

    fn from_env_with(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let config = Self::new();
        match lookup(CACHE_FILE_ENV) {
            Some(path) if !path.is_empty() => config.with_cache_file(path),
            _ => config,
        }
    }
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self::new()
    }
}
