use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_INPUT_SIZE, DEFAULT_MIN_FACE_CONFIDENCE, DEFAULT_REFRESH_HZ,
    HISTORY_CAPACITY, REFRESH_HZ_RANGE,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Parameters handed to the estimator loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub input_width: u32,
    pub input_height: u32,
    /// Multiplier applied to keypoints after mapping back to frame pixels.
    pub scale: f64,
    /// Faces scoring below this are reported as absent.
    pub min_face_confidence: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            input_width: DEFAULT_INPUT_SIZE,
            input_height: DEFAULT_INPUT_SIZE,
            scale: 1.0,
            min_face_confidence: DEFAULT_MIN_FACE_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub estimator: EstimatorConfig,
    pub refresh_hz: f64,
    pub history_capacity: usize,
    pub record_on_start: bool,
    pub marker_radius: u32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorConfig::default(),
            refresh_hz: DEFAULT_REFRESH_HZ,
            history_capacity: HISTORY_CAPACITY,
            record_on_start: false,
            marker_radius: 1,
        }
    }
}

impl LiveConfig {
    /// `<config dir>/FaceMeshLive/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file at [`Self::default_path`] when it exists, defaults otherwise.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let est = &self.estimator;
        if est.input_width == 0 || est.input_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "estimator input resolution must be non-zero, got {}x{}",
                est.input_width, est.input_height
            )));
        }
        if !(est.scale.is_finite() && est.scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "estimator scale must be positive, got {}",
                est.scale
            )));
        }
        if !(0.0..=1.0).contains(&est.min_face_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min face confidence must be between 0.0 and 1.0, got {}",
                est.min_face_confidence
            )));
        }
        if !REFRESH_HZ_RANGE.contains(&self.refresh_hz) {
            return Err(ConfigError::Invalid(format!(
                "refresh rate must be between {} and {} Hz, got {}",
                REFRESH_HZ_RANGE.start(),
                REFRESH_HZ_RANGE.end(),
                self.refresh_hz
            )));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "history capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_is_valid() {
        let config = LiveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_capacity, 10);
        assert!(!config.record_on_start);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"record_on_start": true, "estimator": {"scale": 2.0}}"#).unwrap();

        let config = LiveConfig::load(&path).unwrap();

        assert!(config.record_on_start);
        assert_eq!(config.estimator.scale, 2.0);
        assert_eq!(config.estimator.input_width, DEFAULT_INPUT_SIZE);
        assert_eq!(config.refresh_hz, DEFAULT_REFRESH_HZ);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = LiveConfig::load(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            LiveConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[rstest]
    #[case::zero_width(|c: &mut LiveConfig| c.estimator.input_width = 0)]
    #[case::negative_scale(|c: &mut LiveConfig| c.estimator.scale = -1.0)]
    #[case::confidence_above_one(|c: &mut LiveConfig| c.estimator.min_face_confidence = 1.5)]
    #[case::zero_refresh(|c: &mut LiveConfig| c.refresh_hz = 0.0)]
    #[case::vanishing_refresh(|c: &mut LiveConfig| c.refresh_hz = 1e-300)]
    #[case::huge_refresh(|c: &mut LiveConfig| c.refresh_hz = 1e9)]
    #[case::nan_refresh(|c: &mut LiveConfig| c.refresh_hz = f64::NAN)]
    #[case::zero_capacity(|c: &mut LiveConfig| c.history_capacity = 0)]
    fn test_validate_rejects(#[case] mutate: fn(&mut LiveConfig)) {
        let mut config = LiveConfig::default();
        mutate(&mut config);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_roundtrips_through_json() {
        let config = LiveConfig {
            record_on_start: true,
            marker_radius: 3,
            ..LiveConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: LiveConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
