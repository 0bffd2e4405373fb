//! Panel settings, stored as JSON next to the binary.
//!
//! Command-line flags are applied on top in `main`.

use crate::display::Border;
use crate::image_proc::{BrightnessMode, PrepareOptions, Quantization};
use crate::weather::Coordinates;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Read at startup, rewritten after each upload
pub const DEFAULT_CONFIG_PATH: &str = "/opt/papierek/config.json";

/// The only language the panel has phrases for
pub const LANGUAGE: &str = "pl";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file I/O: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Config is not valid JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Bad setting: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// OpenWeatherMap API key
    #[serde(default)]
    pub api_key: String,

    /// Language of the weather descriptions
    #[serde(default = "default_language")]
    pub language: String,

    /// Photo shown under the text
    #[serde(default)]
    pub background_image: Option<PathBuf>,

    /// Fixed position; geolocation is skipped when both are set
    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    /// Push to the panel only on minutes divisible by this
    #[serde(default = "default_display_every_min")]
    pub display_every_min: u32,

    #[serde(default)]
    pub brightness_mode: BrightnessMode,

    /// Floyd-Steinberg instead of nearest colour
    #[serde(default)]
    pub dither: bool,

    #[serde(default)]
    pub border: Border,

    /// Where frames go when no panel is attached
    #[serde(default = "default_preview_path")]
    pub preview_path: PathBuf,

    /// Where uploaded photos are kept
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Serve the upload page
    #[serde(default = "default_true")]
    pub web_enabled: bool,

    /// Port of the upload page
    #[serde(default = "default_web_port")]
    pub web_port: u16,
}

fn default_language() -> String {
    LANGUAGE.to_string()
}

fn default_display_every_min() -> u32 {
    2
}

fn default_preview_path() -> PathBuf {
    PathBuf::from("/tmp/papierek.png")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("/opt/papierek/uploads")
}

fn default_web_port() -> u16 {
    8888
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: default_language(),
            background_image: None,
            latitude: None,
            longitude: None,
            display_every_min: default_display_every_min(),
            brightness_mode: BrightnessMode::default(),
            dither: false,
            border: Border::default(),
            preview_path: default_preview_path(),
            upload_dir: default_upload_dir(),
            web_enabled: true,
            web_port: default_web_port(),
        }
    }
}

impl Config {
    /// Read and validate `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, or fall back to defaults when it is missing or broken
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!(
                "Failed to load config from {}: {}, using defaults",
                path.display(),
                e
            );
            Self::default()
        })
    }

    /// Write through a temp file and rename, so a power cut never leaves
    /// half a config behind
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, serde_json::to_vec_pretty(self)?)?;

        if let Err(e) = std::fs::rename(&staging, path) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.language != LANGUAGE {
            return Err(ConfigError::ValidationError(format!(
                "language must be '{}', got '{}'",
                LANGUAGE, self.language
            )));
        }

        if self.display_every_min == 0 || self.display_every_min > 60 {
            return Err(ConfigError::ValidationError(
                "display_every_min must be between 1 and 60".to_string(),
            ));
        }

        if self.web_port == 0 {
            return Err(ConfigError::ValidationError(
                "web_port must be greater than 0".to_string(),
            ));
        }

        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                if !Coordinates::new(lat, lon).is_valid() {
                    return Err(ConfigError::ValidationError(format!(
                        "coordinates {lat},{lon} out of range"
                    )));
                }
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "latitude and longitude must be set together".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Fixed coordinates, when configured
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Options for the photo preparation pipeline
    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            mode: self.brightness_mode,
            quantization: if self.dither {
                Quantization::FloydSteinberg
            } else {
                Quantization::Nearest
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.display_every_min, 2);
        assert_eq!(config.web_port, 8888);
        assert_eq!(config.coordinates(), None);
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_key": "abc", "dither": true}"#).unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.language, "pl");
        assert_eq!(config.prepare_options().quantization, Quantization::FloydSteinberg);
        assert_eq!(config.prepare_options().mode, BrightnessMode::Normalize);
    }

    #[test]
    fn test_enums_use_lowercase_names() {
        let config: Config =
            serde_json::from_str(r#"{"brightness_mode": "amplify", "border": "red"}"#).unwrap();
        assert_eq!(config.brightness_mode, BrightnessMode::Amplify);
        assert_eq!(config.border, Border::Red);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            Config {
                display_every_min: 0,
                ..Default::default()
            },
            Config {
                web_port: 0,
                ..Default::default()
            },
            Config {
                language: "en".to_string(),
                ..Default::default()
            },
            Config {
                latitude: Some(52.0),
                ..Default::default()
            },
            Config {
                latitude: Some(95.0),
                longitude: Some(21.0),
                ..Default::default()
            },
        ];

        for config in bad {
            assert!(
                matches!(config.validate(), Err(ConfigError::ValidationError(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config {
            api_key: "key".to_string(),
            background_image: Some(PathBuf::from("/srv/photo.jpg")),
            latitude: Some(50.06),
            longitude: Some(19.94),
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.coordinates(), Some(Coordinates::new(50.06, 19.94)));
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::ParseError(_))));
        assert_eq!(Config::load_or_default(&path), Config::default());
        assert_eq!(Config::load_or_default(dir.path().join("missing.json")), Config::default());
    }
}
