//! Configuration management for the expression analysis application

use crate::constants::DEFAULT_ANOMALY_THRESHOLD;
use crate::emotion::DetectorBackend;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model file locations
    pub models: ModelConfig,

    /// Face/emotion detection parameters
    pub detection: DetectionConfig,

    /// Anomalous movement detection parameters
    pub anomaly: AnomalyConfig,

    /// Output video parameters
    pub output: OutputConfig,
}

/// Model file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Directory containing the ONNX model files
    pub model_dir: PathBuf,

    /// Emotion classifier model file name
    pub emotion_classifier: String,

    /// Pose landmark model file name
    pub pose_landmarks: String,
}

/// Face/emotion detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Face detection model variant (scrfd_500m, scrfd_2.5g, scrfd_10g)
    pub detector_backend: String,

    /// Confidence threshold for face detection (0.0-1.0)
    pub confidence_threshold: f32,

    /// IOU threshold for non-maximum suppression (0.0-1.0)
    pub nms_threshold: f32,

    /// Treat a faceless frame as a perception failure instead of an empty
    /// result
    pub enforce_detection: bool,

    /// Rotate face crops so the eye line is horizontal before
    /// classification
    pub align: bool,
}

/// Anomalous movement detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Average per-landmark displacement threshold, in normalized units
    pub threshold: f32,
}

/// Output video parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Four-character codec code for the output container
    pub fourcc: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: ModelConfig::default(),
            detection: DetectionConfig::default(),
            anomaly: AnomalyConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("assets"),
            emotion_classifier: "emotion_fer7.onnx".to_string(),
            pose_landmarks: "pose_landmark_full.onnx".to_string(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            detector_backend: "scrfd_500m".to_string(),
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
            enforce_detection: false,
            align: false,
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ANOMALY_THRESHOLD,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fourcc: "mp4v".to_string(),
        }
    }
}

impl ModelConfig {
    /// Path to the face detector model for the given backend
    #[must_use]
    pub fn face_detector_path(&self, backend: DetectorBackend) -> PathBuf {
        self.model_dir.join(backend.model_file())
    }

    /// Path to the emotion classifier model
    #[must_use]
    pub fn emotion_classifier_path(&self) -> PathBuf {
        self.model_dir.join(&self.emotion_classifier)
    }

    /// Path to the pose landmark model
    #[must_use]
    pub fn pose_landmarks_path(&self) -> PathBuf {
        self.model_dir.join(&self.pose_landmarks)
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The configured detector backend
    ///
    /// # Errors
    ///
    /// Returns an error if the configured name is not a known backend.
    pub fn detector_backend(&self) -> Result<DetectorBackend> {
        self.detection.detector_backend.parse()
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.detector_backend()?;

        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(Error::ConfigError(
                "Confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detection.nms_threshold) {
            return Err(Error::ConfigError(
                "NMS threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.anomaly.threshold <= 0.0 {
            return Err(Error::ConfigError(
                "Anomaly threshold must be greater than 0".to_string(),
            ));
        }

        if self.output.fourcc.chars().count() != 4 {
            return Err(Error::ConfigError(format!(
                "Output fourcc must be exactly 4 characters, got {:?}",
                self.output.fourcc
            )));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Expression Analysis Configuration

# Model locations
models:
  model_dir: "assets"
  emotion_classifier: "emotion_fer7.onnx"
  pose_landmarks: "pose_landmark_full.onnx"

# Face/emotion detection
detection:
  detector_backend: "scrfd_500m"
  confidence_threshold: 0.5
  nms_threshold: 0.4
  enforce_detection: false
  align: false

# Anomalous movement detection
anomaly:
  threshold: 0.2

# Output video
output:
  fourcc: "mp4v"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector_backend().unwrap(), DetectorBackend::Scrfd500m);
    }

    #[test]
    fn test_example_config_parses_and_validates() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).expect("example config parses");
        assert!(config.validate().is_ok());
        assert_eq!(config.anomaly.threshold, DEFAULT_ANOMALY_THRESHOLD);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = Config::default();
        config.detection.detector_backend = "mtcnn".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_thresholds_rejected() {
        let mut config = Config::default();
        config.detection.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.anomaly.threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.fourcc = "mp4".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_paths_include_backend_file() {
        let models = ModelConfig::default();
        let path = models.face_detector_path(DetectorBackend::Scrfd10g);
        assert!(path.ends_with("scrfd_10g_kps.onnx"));
    }
}
