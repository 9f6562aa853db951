//! Runtime configuration.

use crate::stroke::{DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH, StrokeStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default quiet period before an autosave fires.
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 1000;
/// Eraser radius as a multiple of the stroke width.
pub const DEFAULT_ERASER_RADIUS_FACTOR: f64 = 10.0;
/// Quota of the fast key-value store.
pub const DEFAULT_FAST_STORE_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("Invalid config: {0}")]
    Parse(String),
}

/// Settings shared by the tool machine, the note store and the backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub autosave_debounce_ms: u64,
    pub eraser_radius_factor: f64,
    pub fast_store_quota_bytes: usize,
    /// Only pens may draw; touch and mouse are ignored by the pencil.
    pub pen_only: bool,
    pub stroke_color: String,
    pub stroke_width: f64,
    /// Where file-backed stores live. `None` uses the platform default.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: DEFAULT_AUTOSAVE_DEBOUNCE_MS,
            eraser_radius_factor: DEFAULT_ERASER_RADIUS_FACTOR,
            fast_store_quota_bytes: DEFAULT_FAST_STORE_QUOTA_BYTES,
            pen_only: true,
            stroke_color: DEFAULT_STROKE_COLOR.to_string(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            data_dir: None,
        }
    }
}

impl Config {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Resolved data directory.
    ///
    /// On Unix: `~/.local/share/inknote/`
    /// On Windows: `%LOCALAPPDATA%\inknote\`
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(|| {
            dirs::data_local_dir()
                .or_else(dirs::home_dir)
                .map(|base| base.join("inknote"))
        })
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Style applied to newly drawn strokes.
    pub fn stroke_style(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.stroke_color.clone(),
            width: self.stroke_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.autosave_delay(), Duration::from_secs(1));
        assert_eq!(config.eraser_radius_factor, 10.0);
        assert!(config.pen_only);
        assert_eq!(config.stroke_style(), StrokeStyle::default());
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json(r#"{"pen_only": false, "stroke_width": 4.0}"#).unwrap();
        assert!(!config.pen_only);
        assert_eq!(config.stroke_width, 4.0);
        assert_eq!(config.autosave_debounce_ms, DEFAULT_AUTOSAVE_DEBOUNCE_MS);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(Config::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inknote.json");
        fs::write(&path, r#"{"data_dir": "/tmp/notes"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.data_dir(), Some(PathBuf::from("/tmp/notes")));

        let missing = Config::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
