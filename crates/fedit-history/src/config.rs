#![forbid(unsafe_code)]

//! History tuning loaded from TOML or JSON.
//!
//! # Loading
//!
//! ```toml
//! # fedit-history.toml
//! merge_window_ms = 300
//! max_depth = 200
//! ```
//!
//! ```rust,ignore
//! let config = HistoryConfig::from_toml_file("fedit-history.toml")?;
//! let config = HistoryConfig::from_json_str(r#"{ "max_depth": 50 }"#)?;
//! let config = HistoryConfig::load("fedit-history.toml")?; // picks format, validates
//! ```
//!
//! # Defaults
//!
//! Omitted fields keep their defaults: a 500 ms merge window and an
//! unbounded undo stack.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default merge window in milliseconds.
pub const DEFAULT_MERGE_WINDOW_MS: u64 = 500;

/// Largest accepted merge window.
pub const MAX_MERGE_WINDOW_MS: u64 = 60_000;

/// Configuration for [`History`](crate::History).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// How long after an execute a compatible command may still merge into
    /// it. Default: 500.
    pub merge_window_ms: u64,

    /// Maximum number of undo entries kept. Oldest entries are purged first.
    /// Default: unbounded, written out by omitting the field.
    #[serde(skip_serializing_if = "is_unbounded")]
    pub max_depth: usize,
}

fn is_unbounded(depth: &usize) -> bool {
    *depth == usize::MAX
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            merge_window_ms: DEFAULT_MERGE_WINDOW_MS,
            max_depth: usize::MAX,
        }
    }
}

impl HistoryConfig {
    /// Defaults with an unbounded undo stack.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Set the merge window.
    #[must_use]
    pub fn with_merge_window_ms(mut self, ms: u64) -> Self {
        self.merge_window_ms = ms;
        self
    }

    /// Set the maximum undo depth.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// The merge window as a duration.
    #[must_use]
    pub fn merge_window(&self) -> Duration {
        Duration::from_millis(self.merge_window_ms)
    }

    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Load a file, choosing JSON for `.json` and TOML otherwise, and reject
    /// out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path)?,
            _ => Self::from_toml_file(path)?,
        };
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_depth == 0 {
            errors.push("max_depth must be > 0".into());
        }

        if self.merge_window_ms > MAX_MERGE_WINDOW_MS {
            errors.push(format!(
                "merge_window_ms must be <= {MAX_MERGE_WINDOW_MS}, got {}",
                self.merge_window_ms
            ));
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a history configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    Toml(toml::de::Error),
    /// JSON parse error.
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HistoryConfig::default();
        assert_eq!(config.merge_window_ms, 500);
        assert_eq!(config.max_depth, usize::MAX);
        assert_eq!(config.merge_window(), Duration::from_millis(500));
        assert_eq!(HistoryConfig::unlimited(), config);
    }

    #[test]
    fn default_validates_clean() {
        assert!(HistoryConfig::default().validate().is_empty());
    }

    #[test]
    fn validate_catches_zero_depth() {
        let errors = HistoryConfig::default().with_max_depth(0).validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("max_depth"));
    }

    #[test]
    fn validate_catches_huge_window() {
        let errors = HistoryConfig::default()
            .with_merge_window_ms(MAX_MERGE_WINDOW_MS + 1)
            .validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("merge_window_ms"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = HistoryConfig::from_toml_str("max_depth = 20").unwrap();
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.merge_window_ms, DEFAULT_MERGE_WINDOW_MS);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = HistoryConfig::from_json_str(r#"{ "merge_window_ms": 250 }"#).unwrap();
        assert_eq!(config.merge_window_ms, 250);
        assert_eq!(config.max_depth, usize::MAX);
    }

    #[test]
    fn unbounded_depth_survives_toml() {
        let text = toml::to_string(&HistoryConfig::default()).unwrap();
        assert!(!text.contains("max_depth"));
        assert_eq!(HistoryConfig::from_toml_str(&text).unwrap(), HistoryConfig::default());

        let bounded = HistoryConfig::default().with_max_depth(64);
        let text = toml::to_string(&bounded).unwrap();
        assert_eq!(HistoryConfig::from_toml_str(&text).unwrap(), bounded);
    }

    #[test]
    fn bad_input_reports_format() {
        let toml_err = HistoryConfig::from_toml_str("max_depth = \"deep\"").unwrap_err();
        assert!(toml_err.to_string().starts_with("TOML parse error"));
        let json_err = HistoryConfig::from_json_str("{").unwrap_err();
        assert!(json_err.to_string().starts_with("JSON parse error"));
    }

    #[test]
    fn validation_error_display_joins_messages() {
        let err = ConfigError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "validation errors: a; b");
        assert!(std::error::Error::source(&err).is_none());
    }
}
