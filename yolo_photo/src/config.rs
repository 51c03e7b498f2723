use crate::{decoder::OutputLayout, pipeline::ReductionPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default, deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    pub labels: LabelsConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

pub trait Validatable {
    fn get_path(&self) -> PathBuf;
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub onnx_file: String,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    #[serde(default = "default_output_name")]
    pub output_name: String,
    #[serde(default = "default_input_size")]
    pub input_width: u32,
    #[serde(default = "default_input_size")]
    pub input_height: u32,
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
    #[serde(default)]
    pub output_layout: OutputLayout,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_input_name() -> String {
    "images".to_string()
}

fn default_output_name() -> String {
    "output0".to_string()
}

fn default_input_size() -> u32 {
    640
}

fn default_num_classes() -> usize {
    80
}

fn default_intra_threads() -> usize {
    1
}

impl Validatable for ModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    fn validate(&self) -> Result<(), String> {
        if !self.get_path().exists() {
            return Err(format!("Model file not found: {:?}", self.get_path()));
        }
        if self.input_width == 0 || self.input_height == 0 {
            return Err("Model input dimensions must be positive".to_string());
        }
        if self.num_classes == 0 {
            return Err("Model must have at least one class".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelsConfig {
    pub labels_dir: PathBuf,
    pub labels_file: String,
}

impl Validatable for LabelsConfig {
    fn get_path(&self) -> PathBuf {
        self.labels_dir.join(&self.labels_file)
    }

    fn validate(&self) -> Result<(), String> {
        if !self.get_path().exists() {
            return Err(format!("Labels file not found: {:?}", self.get_path()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Upper bound of the model's class scores: 1.0 for probabilities.
    #[serde(default = "default_score_scale")]
    pub score_scale: f32,
    /// `None` disables non-max suppression.
    #[serde(default)]
    pub nms_iou_threshold: Option<f32>,
    #[serde(default)]
    pub reduction: ReductionPolicy,
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_score_scale() -> f32 {
    1.0
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            score_scale: default_score_scale(),
            nms_iou_threshold: None,
            reduction: ReductionPolicy::default(),
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.score_scale.is_nan() || self.score_scale <= 0.0 {
            return Err(format!(
                "score_scale must be positive, got {}",
                self.score_scale
            ));
        }
        if let Some(iou) = self.nms_iou_threshold {
            if !(0.0..=1.0).contains(&iou) {
                return Err(format!("nms_iou_threshold must be within [0, 1], got {}", iou));
            }
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        self.model.validate()?;
        self.labels.validate()?;
        self.detection.validate()
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("No current directory: {}", e)))?;

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    get_configuration_from(&base_path.join("configuration"), environment)
}

pub fn get_configuration_from(
    configuration_directory: &Path,
    environment: Environment,
) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config = settings.try_deserialize::<Config>()?;
    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        return Err(config::ConfigError::Message(e));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_configuration(dir: &Path, detection: &str) {
        fs::write(dir.join("yolov8n.onnx"), b"not really a model").unwrap();
        fs::write(dir.join("labels.txt"), "person\nbicycle\n").unwrap();
        let base = format!(
            "log_level: debug\n\
             model:\n  model_dir: {dir}\n  onnx_file: yolov8n.onnx\n  num_classes: 2\n\
             labels:\n  labels_dir: {dir}\n  labels_file: labels.txt\n{detection}",
            dir = dir.display(),
        );
        fs::write(dir.join("base.yaml"), base).unwrap();
    }

    #[test]
    fn test_defaults_fill_model_contract() {
        let dir = tempfile::tempdir().unwrap();
        write_configuration(dir.path(), "");

        let config = get_configuration_from(dir.path(), Environment::Local).unwrap();

        assert!(matches!(config.log_level, LogLevel::Debug));
        assert_eq!(config.model.input_name, "images");
        assert_eq!(config.model.output_name, "output0");
        assert_eq!((config.model.input_width, config.model.input_height), (640, 640));
        assert_eq!(config.model.num_classes, 2);
        assert_eq!(config.model.output_layout, OutputLayout::AttributeMajor);
        assert_eq!(config.detection.confidence_threshold, 0.5);
        assert_eq!(config.detection.score_scale, 1.0);
        assert_eq!(config.detection.nms_iou_threshold, None);
        assert_eq!(config.detection.reduction, ReductionPolicy::HighestConfidence);
    }

    #[test]
    fn test_environment_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        write_configuration(dir.path(), "detection:\n  confidence_threshold: 0.25\n");
        fs::write(
            dir.path().join("production.yaml"),
            "detection:\n  score_scale: 100.0\n  nms_iou_threshold: 0.7\n  reduction: discard\n",
        )
        .unwrap();

        let config = get_configuration_from(dir.path(), Environment::Production).unwrap();

        assert_eq!(config.detection.confidence_threshold, 0.25);
        assert_eq!(config.detection.score_scale, 100.0);
        assert_eq!(config.detection.nms_iou_threshold, Some(0.7));
        assert_eq!(config.detection.reduction, ReductionPolicy::Discard);
    }

    #[test]
    fn test_rejects_threshold_outside_unit_range() {
        let dir = tempfile::tempdir().unwrap();
        write_configuration(dir.path(), "detection:\n  confidence_threshold: 50.0\n");

        let result = get_configuration_from(dir.path(), Environment::Local);

        assert!(matches!(result, Err(config::ConfigError::Message(_))));
    }

    #[test]
    fn test_missing_model_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        write_configuration(dir.path(), "");
        fs::remove_file(dir.path().join("yolov8n.onnx")).unwrap();

        let err = get_configuration_from(dir.path(), Environment::Local).unwrap_err();

        assert!(err.to_string().contains("Model file not found"));
    }

    #[test]
    fn test_missing_labels_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        write_configuration(dir.path(), "");
        fs::remove_file(dir.path().join("labels.txt")).unwrap();

        let err = get_configuration_from(dir.path(), Environment::Local).unwrap_err();

        assert!(err.to_string().contains("Labels file not found"));
    }

    #[test]
    fn test_environment_parsing() {
        assert!(Environment::try_from("PRODUCTION".to_string()).is_ok());
        assert!(Environment::try_from("staging".to_string()).is_err());
    }
}
