//! Configuration module.
//!
//! Handles loading, validating, and merging `pixpress.toml`. Stock defaults
//! are the base layer; a user file overrides just the keys it names; CLI
//! flags override both.
//!
//! ## Config File Location
//!
//! `pixpress.toml` in the working directory is picked up automatically.
//! `--config <path>` points at any other file (which must then exist).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [defaults]
//! min_width = 1920          # Bounding box the output must fit
//! min_height = 1080
//! quality = 95              # Lossy quality (0-100)
//! rotate = 0                # Degrees clockwise, any integer
//! format = "jpeg"           # jpeg | png | heic | webp (or 0-3)
//! keep_exif = false         # Carry EXIF/IPTC/JFIF into JPEG output
//! auto_correction = true    # Bake EXIF orientation into pixels
//! in_sample_size = 1        # Extra integer downscale divisor
//!
//! [processing]
//! max_workers = 4           # Batch workers (omit for auto = 4-6 by cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [defaults]
//! quality = 80
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    CompressRequest, DEFAULT_MIN_HEIGHT, DEFAULT_MIN_WIDTH, OutputFormat, Quality,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "pixpress.toml";

/// Lower and upper bound of the automatic batch worker count.
const AUTO_WORKERS_MIN: usize = 4;
const AUTO_WORKERS_MAX: usize = 6;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `pixpress.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PixpressConfig {
    /// Request values used when the CLI does not override them.
    pub defaults: DefaultsConfig,
    /// Batch worker pool settings.
    pub processing: ProcessingConfig,
}

impl PixpressConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.defaults;
        if d.quality > 100 {
            return Err(ConfigError::Validation(
                "defaults.quality must be 0-100".into(),
            ));
        }
        if d.min_width == 0 || d.min_height == 0 {
            return Err(ConfigError::Validation(
                "defaults.min_width and defaults.min_height must be non-zero".into(),
            ));
        }
        if d.in_sample_size == 0 {
            return Err(ConfigError::Validation(
                "defaults.in_sample_size must be at least 1".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Default request values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    pub min_width: u32,
    pub min_height: u32,
    pub quality: u32,
    pub rotate: i32,
    pub format: OutputFormat,
    pub keep_exif: bool,
    pub auto_correction: bool,
    pub in_sample_size: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let request = CompressRequest::default();
        Self {
            min_width: DEFAULT_MIN_WIDTH,
            min_height: DEFAULT_MIN_HEIGHT,
            quality: request.quality.value(),
            rotate: request.rotate,
            format: request.format,
            keep_exif: request.keep_exif,
            auto_correction: request.auto_correction,
            in_sample_size: request.in_sample_size,
        }
    }
}

impl DefaultsConfig {
    /// Build the request these defaults describe.
    pub fn to_request(&self) -> CompressRequest {
        CompressRequest {
            min_width: self.min_width,
            min_height: self.min_height,
            in_sample_size: self.in_sample_size,
            rotate: self.rotate,
            quality: Quality::new(self.quality as i64),
            format: self.format,
            keep_exif: self.keep_exif,
            auto_correction: self.auto_correction,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Number of batch workers. When absent, derived from the core count.
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → core count clamped to `4..=6`
/// - `Some(n)` → `n`, at least 1
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    auto_or_explicit_workers(config.max_workers, cores)
}

fn auto_or_explicit_workers(max_workers: Option<usize>, cores: usize) -> usize {
    match max_workers {
        Some(n) => n.max(1),
        None => cores.clamp(AUTO_WORKERS_MIN, AUTO_WORKERS_MAX),
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PixpressConfig::default()).expect("default config must serialize")
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

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PixpressConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PixpressConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration.
///
/// With an explicit path the file must exist. Without one,
/// [`DEFAULT_CONFIG_FILE`] in `dir` is used if present, else stock defaults.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<PixpressConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => Some(load_raw_config(path)?),
        None => {
            let implicit = dir.join(DEFAULT_CONFIG_FILE);
            if implicit.exists() {
                Some(load_raw_config(&implicit)?)
            } else {
                None
            }
        }
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `pixpress.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixpress configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# pixpress reads ./pixpress.toml automatically; pass --config to use
# another file. Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Request defaults
# ---------------------------------------------------------------------------
[defaults]
# Bounding box the output is scaled to fit. Images already inside the box
# are never enlarged.
min_width = 1920
min_height = 1080

# Lossy encoding quality (0-100). WebP output is lossless and ignores it.
quality = 95

# Clockwise rotation in degrees. Any integer; normalized into 0-359.
rotate = 0

# Output container: "jpeg", "png", "heic" or "webp" (wire codes 0-3 also
# accepted). HEIC output is not available in this build.
format = "jpeg"

# Carry EXIF, IPTC and JFIF blocks into JPEG output. The orientation tag is
# reset to upright because rotation is baked into the pixels.
keep_exif = false

# Apply the source's EXIF orientation to the pixels before encoding.
auto_correction = true

# Additional integer downscale divisor applied after fitting the box.
in_sample_size = 1

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Number of parallel batch workers. When omitted, the core count clamped to
# 4-6 is used.
# max_workers = 4
"##
}
