//! Configuration file parser for ~/.config/rssfeed/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as a warning, since they are
//! usually typos.
use crate::feed::source::{DEFAULT_MAX_FEED_BYTES, DEFAULT_TIMEOUT};
use crate::feed::DEFAULT_AGE_DAYS;
use crate::render::DEFAULT_TITLE;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Parsed fine but the values make no sense.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Title of the generated document.
    pub title: String,

    /// Keep entries at most this many days old. Fractions allowed.
    pub age_days: f64,

    /// Where to write the document. `None` writes to stdout.
    pub output: Option<PathBuf>,

    /// Per-request timeout in seconds (connect + body).
    pub timeout_secs: u64,

    /// Largest feed body accepted, in bytes.
    pub max_feed_bytes: usize,

    /// Allow feeds on localhost and private networks.
    pub allow_private_hosts: bool,

    /// Feeds in document order.
    pub feeds: Vec<FeedConfig>,
}

/// One `[[feeds]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// Key the feed's entries are grouped and labelled under.
    pub id: String,
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            age_days: DEFAULT_AGE_DAYS,
            output: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_feed_bytes: DEFAULT_MAX_FEED_BYTES,
            allow_private_hosts: false,
            feeds: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "title",
        "age_days",
        "output",
        "timeout_secs",
        "max_feed_bytes",
        "allow_private_hosts",
        "feeds",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Invalid values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading a huge or corrupt file
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot: the recency window and feed ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.age_days.is_finite() || self.age_days < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "age_days must be a non-negative number, got {}",
                self.age_days
            )));
        }

        let mut seen = HashSet::new();
        for feed in &self.feeds {
            validate_feed_id(&feed.id)?;
            if !seen.insert(feed.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate feed id '{}'",
                    feed.id
                )));
            }
            if feed.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "feed '{}' has an empty url",
                    feed.id
                )));
            }
        }
        Ok(())
    }
}

/// Ids end up as ConTeXt labels, so they are restricted to a plain alphabet.
pub fn validate_feed_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::Invalid("feed id must not be empty".into()));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')))
    {
        return Err(ConfigError::Invalid(format!(
            "feed id '{}' contains '{}'; use letters, digits, '-', '_', '.' or ':'",
            id, bad
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
