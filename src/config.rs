//! Configuration file parser for ~/.config/clipfeed/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use crate::engine::{
    EngineSettings, BASE_PAGE_SIZE, CLICK_WINDOW, LOAD_MORE_THRESHOLD, MAX_PAGE_SIZE,
    SCROLL_DEBOUNCE, SEARCH_DEBOUNCE,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
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

    #[error("Invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Records per page, excluding the lookahead row.
    pub page_size: usize,

    /// Quiet period after a keystroke before the feed reloads.
    pub search_debounce_ms: u64,

    /// Quiet period after a scroll event before the next page is requested.
    pub scroll_debounce_ms: u64,

    /// How long a first press waits for a second one before selecting.
    pub click_window_ms: u64,

    /// Fraction of a viewport from the tail at which the next page loads.
    pub load_more_threshold: f64,

    /// History database location. Defaults to the config directory.
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: BASE_PAGE_SIZE,
            search_debounce_ms: SEARCH_DEBOUNCE.as_millis() as u64,
            scroll_debounce_ms: SCROLL_DEBOUNCE.as_millis() as u64,
            click_window_ms: CLICK_WINDOW.as_millis() as u64,
            load_more_threshold: LOAD_MORE_THRESHOLD,
            database_path: None,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "page_size",
        "search_debounce_ms",
        "scroll_debounce_ms",
        "click_window_ms",
        "load_more_threshold",
        "database_path",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid slurping a huge file.
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
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            page_size = config.page_size,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ConfigError::Invalid {
                key: "page_size",
                reason: format!("{} is outside 1..={}", self.page_size, MAX_PAGE_SIZE),
            });
        }
        if !(self.load_more_threshold > 0.0 && self.load_more_threshold <= 1.0) {
            return Err(ConfigError::Invalid {
                key: "load_more_threshold",
                reason: format!("{} is outside (0, 1]", self.load_more_threshold),
            });
        }
        Ok(())
    }

    /// Engine tunables derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            page_size: self.page_size,
            search_debounce: Duration::from_millis(self.search_debounce_ms),
            scroll_debounce: Duration::from_millis(self.scroll_debounce_ms),
            click_window: Duration::from_millis(self.click_window_ms),
            load_more_threshold: self.load_more_threshold,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
