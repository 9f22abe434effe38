//! Configuration module.
//!
//! Handles loading, validating, and merging `boxscale.toml`. Stock defaults
//! are the base layer; a user config file, if present, is merged on top.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! format = "jpeg"           # jpeg | png | webp | bmp
//! quality = 0.85            # 0.0 - 1.0, JPEG only
//!
//! [cache]
//! capacity = 64             # Max decoded sources kept (omit for unbounded)
//!
//! [fetch]
//! timeout_secs = 30         # HTTP request timeout
//! user_agent = "boxscale/0.3.0"
//!
//! [processing]
//! max_threads = 4           # Downsampling workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [output]
//! format = "png"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{ImageFormat, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "boxscale.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `boxscale.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Default encoding for produced images.
    pub output: OutputConfig,
    /// Decoded-source cache bounds.
    pub cache: CacheConfig,
    /// HTTP acquisition settings.
    pub fetch: FetchConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let quality = self.output.quality.value();
        if !(0.0..=1.0).contains(&quality) {
            return Err(ConfigError::Validation(
                "output.quality must be 0.0-1.0".into(),
            ));
        }
        if self.cache.capacity == Some(0) {
            return Err(ConfigError::Validation(
                "cache.capacity must be positive (omit it for an unbounded cache)".into(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be positive".into(),
            ));
        }
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Output encoding defaults, overridable per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: ImageFormat,
    pub quality: Quality,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of decoded sources kept in memory.
    /// When absent, decoded sources are kept for the life of the process.
    pub capacity: Option<usize>,
}

impl CacheConfig {
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity.and_then(NonZeroUsize::new)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("boxscale/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of downsampling worker threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer that user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(Config::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`, falling back to stock defaults when
/// it does not exist.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `boxscale.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# boxscale configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Encoding used when a request does not name one.
# One of: "jpeg", "png", "webp", "bmp".
format = "jpeg"

# JPEG quality, 0.0 (smallest) to 1.0 (best). Lossless formats ignore it.
quality = 0.85

# ---------------------------------------------------------------------------
# Decoded-source cache
# ---------------------------------------------------------------------------
[cache]
# Maximum number of decoded sources kept in memory. The least recently used
# one is dropped when the limit is exceeded. Omit for an unbounded cache.
# capacity = 64

# ---------------------------------------------------------------------------
# HTTP acquisition
# ---------------------------------------------------------------------------
[fetch]
# Seconds before a URL fetch is abandoned.
timeout_secs = 30

# User-Agent header sent with every fetch.
# user_agent = "boxscale/<version>"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of downsampling worker threads.
# Omit to use all CPU cores. Values above the core count are clamped down.
# max_threads = 4
"##
}
