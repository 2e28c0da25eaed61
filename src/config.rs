//! Library configuration: JSON file and environment overrides

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::batch::{BatchOptions, DEFAULT_ITEM_TIMEOUT, DEFAULT_MAX_WORKERS};
use crate::builder::{DEFAULT_HTML_TO_TEXT_LIMIT, ParserOptions};
use crate::error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logger: LoggerConfig,

    /// Deadline for the single-message save in `parse_and_save`
    #[serde(default = "default_persist_timeout", deserialize_with = "duration_str")]
    pub persist_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            batch: BatchConfig::default(),
            cache: CacheConfig::default(),
            logger: LoggerConfig::default(),
            persist_timeout: default_persist_timeout(),
        }
    }
}

/// Entity assembly settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub include_html: bool,

    #[serde(default = "default_html_to_text_limit")]
    pub html_to_text_limit: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            include_html: false,
            html_to_text_limit: default_html_to_text_limit(),
        }
    }
}

/// Default batch settings, overridable per call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_item_timeout", deserialize_with = "duration_str")]
    pub item_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            item_timeout: default_item_timeout(),
        }
    }
}

/// Cache-aside layer in front of the repository
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl", deserialize_with = "duration_str")]
    pub ttl: Duration,

    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: default_cache_ttl(),
            capacity: default_cache_capacity(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Defaults overridden by process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (`INCLUDE_HTML`, `BATCH_MAX_WORKERS`, ...)
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("INCLUDE_HTML") {
            self.parser.include_html = parse_bool("INCLUDE_HTML", &v)?;
        }
        if let Some(v) = get("HTML_TO_TEXT_LIMIT") {
            self.parser.html_to_text_limit = parse_number("HTML_TO_TEXT_LIMIT", &v)?;
        }
        if let Some(v) = get("BATCH_MAX_WORKERS") {
            self.batch.max_workers = parse_number("BATCH_MAX_WORKERS", &v)?;
        }
        if let Some(v) = get("BATCH_ITEM_TIMEOUT") {
            self.batch.item_timeout = parse_duration_var("BATCH_ITEM_TIMEOUT", &v)?;
        }
        if let Some(v) = get("CACHE_ENABLED") {
            self.cache.enabled = parse_bool("CACHE_ENABLED", &v)?;
        }
        if let Some(v) = get("CACHE_TTL") {
            self.cache.ttl = parse_duration_var("CACHE_TTL", &v)?;
        }
        if let Some(v) = get("CACHE_CAPACITY") {
            self.cache.capacity = parse_number("CACHE_CAPACITY", &v)?;
        }
        if let Some(v) = get("LOGGER_LEVEL") {
            self.logger.level = v.trim().to_string();
        }
        if let Some(v) = get("LOGGER_JSON") {
            self.logger.json = parse_bool("LOGGER_JSON", &v)?;
        }
        if let Some(v) = get("PERSIST_TIMEOUT") {
            self.persist_timeout = parse_duration_var("PERSIST_TIMEOUT", &v)?;
        }

        Ok(self)
    }

    #[must_use]
    pub const fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            include_html: self.parser.include_html,
            html_to_text_limit: self.parser.html_to_text_limit,
        }
    }

    #[must_use]
    pub const fn batch_options(&self) -> BatchOptions {
        BatchOptions::new(self.batch.max_workers, self.batch.item_timeout)
    }
}

/// Parse a Go-style duration such as `500ms`, `2s`, `1m30s` or `1.5h`.
///
/// Supported units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.
#[must_use]
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input == "0" {
        return Some(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = input;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }
        let value: f64 = rest[..number_end].parse().ok()?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_end..];
        total += value * nanos_per_unit;
    }

    if !total.is_finite() || total < 0.0 {
        return None;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nanos = total as u64;
    Some(Duration::from_nanos(nanos))
}

fn duration_str<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {raw}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_duration_var(key: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

const fn default_persist_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_html_to_text_limit() -> usize {
    DEFAULT_HTML_TO_TEXT_LIMIT
}

const fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

const fn default_item_timeout() -> Duration {
    DEFAULT_ITEM_TIMEOUT
}

const fn default_cache_ttl() -> Duration {
    Duration::from_secs(300)
}

const fn default_cache_capacity() -> u64 {
    10_000
}

fn default_level() -> String {
    "info".to_string()
}
