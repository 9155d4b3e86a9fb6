//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Output-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Target output formats, one converted file per format
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
}

fn default_formats() -> Vec<String> {
    vec!["webp".to_string()]
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: default_formats(),
        }
    }
}

/// Quality-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityConfig {
    /// Baseline per-format quality values, overridden by matching rules
    #[serde(default = "default_quality_map")]
    pub defaults: BTreeMap<String, u8>,
}

fn default_quality_map() -> BTreeMap<String, u8> {
    let mut map = BTreeMap::new();
    map.insert("webp".to_string(), 80);
    map.insert("avif".to_string(), 60);
    map.insert("jpeg".to_string(), 85);
    map
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            defaults: default_quality_map(),
        }
    }
}

/// A conditional quality rule.
///
/// A rule matches a file iff every predicate it declares evaluates true;
/// absent predicates are vacuously true. Rules carry only the quality keys
/// they want to override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct QualityRule {
    /// Case-insensitive glob matched against the filename only
    pub pattern: Option<String>,
    /// Path fragment matched by substring containment anywhere in the path
    pub directory: Option<String>,
    /// Minimum image width in pixels (requires metadata)
    pub min_width: Option<u32>,
    /// Minimum image height in pixels (requires metadata)
    pub min_height: Option<u32>,
    /// Maximum image width in pixels (requires metadata)
    pub max_width: Option<u32>,
    /// Maximum image height in pixels (requires metadata)
    pub max_height: Option<u32>,
    /// Per-format quality overrides applied when the rule matches
    #[serde(default)]
    pub quality: BTreeMap<String, u8>,
}

impl QualityRule {
    /// Check if any size predicate is declared.
    pub fn has_size_predicate(&self) -> bool {
        self.min_width.is_some()
            || self.min_height.is_some()
            || self.max_width.is_some()
            || self.max_height.is_some()
    }
}

/// Error-recovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryConfig {
    /// Maximum attempts per file (default 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between attempts in milliseconds (default 1000)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Double the delay after each failed attempt (default true)
    #[serde(default = "default_exponential_backoff")]
    pub exponential_backoff: bool,
    /// Keep processing remaining files after a terminal per-file failure
    #[serde(default)]
    pub continue_on_error: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_exponential_backoff() -> bool {
    true
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            exponential_backoff: default_exponential_backoff(),
            continue_on_error: false,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub rules: Vec<QualityRule>,
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the TOML file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - IMGFORGE_MAX_RETRIES -> recovery.max_retries
    /// - IMGFORGE_RETRY_DELAY_MS -> recovery.retry_delay_ms
    /// - IMGFORGE_EXPONENTIAL_BACKOFF -> recovery.exponential_backoff
    /// - IMGFORGE_CONTINUE_ON_ERROR -> recovery.continue_on_error
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("IMGFORGE_MAX_RETRIES") {
            if let Ok(retries) = val.parse::<u32>() {
                self.recovery.max_retries = retries;
            }
        }

        if let Ok(val) = env::var("IMGFORGE_RETRY_DELAY_MS") {
            if let Ok(delay) = val.parse::<u64>() {
                self.recovery.retry_delay_ms = delay;
            }
        }

        if let Ok(val) = env::var("IMGFORGE_EXPONENTIAL_BACKOFF") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.recovery.exponential_backoff = true,
                "false" | "0" | "no" => self.recovery.exponential_backoff = false,
                _ => {} // Invalid value, keep existing
            }
        }

        if let Ok(val) = env::var("IMGFORGE_CONTINUE_ON_ERROR") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.recovery.continue_on_error = true,
                "false" | "0" | "no" => self.recovery.continue_on_error = false,
                _ => {}
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }
}
