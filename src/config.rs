//! Configuration management for the AMP prediction pipeline

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model selection strategy for internal models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStrategy {
    /// Run a single named internal model
    #[default]
    Single,
    /// Run every discovered internal model and combine them by majority vote
    Ensemble,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub artifacts: ArtifactsConfig,
    pub prediction: PredictionConfig,
    pub output: OutputConfig,
    pub features: FeaturesConfig,
    pub logging: LoggingConfig,
}

/// Where trained artifacts live and how internal models are named
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory containing internal model artifacts
    pub models_dir: String,
    /// File name prefix of internal models (`amp_model_<name>.<ext>`)
    #[serde(default = "default_model_prefix")]
    pub model_prefix: String,
    /// Extensions recognised as model artifacts, in lookup order
    #[serde(default = "default_model_extensions")]
    pub model_extensions: Vec<String>,
    /// Fitted scaler applied to internal models only
    #[serde(default)]
    pub scaler_path: Option<String>,
}

fn default_model_prefix() -> String {
    "amp_model_".to_string()
}

fn default_model_extensions() -> Vec<String> {
    vec!["onnx".to_string(), "json".to_string()]
}

/// Which models a run evaluates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// "single" or "ensemble"
    #[serde(default)]
    pub strategy: PredictionStrategy,
    /// Internal model name for the single-model strategy
    #[serde(default = "default_internal_model")]
    pub internal_model: String,
    /// Caller-supplied comparison models, passed unscaled
    #[serde(default)]
    pub external_models: Vec<String>,
}

fn default_internal_model() -> String {
    "rf".to_string()
}

/// Report file names, relative to the output directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub features_report: String,
    pub comparison_report: String,
    pub run_summary: String,
}

/// Descriptor calculation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Treat the C-terminus as amidated
    pub amide: bool,
    /// pH used for net charge
    pub ph: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    ///
    /// Values are layered: built-in defaults, then the file (if it exists),
    /// then `AMP__SECTION__KEY` environment variables.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .context("Failed to serialize default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("AMP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("prediction.external_models")
                    .with_list_parse_key("artifacts.model_extensions")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Path of the scaler artifact, if one is configured
    pub fn scaler_path(&self) -> Option<PathBuf> {
        self.artifacts
            .scaler_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifacts: ArtifactsConfig {
                models_dir: "model_training/saved_model".to_string(),
                model_prefix: default_model_prefix(),
                model_extensions: default_model_extensions(),
                scaler_path: Some("model_training/saved_model/feature_scaler.json".to_string()),
            },
            prediction: PredictionConfig {
                strategy: PredictionStrategy::Single,
                internal_model: default_internal_model(),
                external_models: Vec::new(),
            },
            output: OutputConfig {
                features_report: "physicochemical_features.csv".to_string(),
                comparison_report: "prediction_comparison_report.csv".to_string(),
                run_summary: "prediction_run_summary.json".to_string(),
            },
            features: FeaturesConfig {
                amide: true,
                ph: 7.0,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.artifacts.models_dir, "model_training/saved_model");
        assert_eq!(config.artifacts.model_prefix, "amp_model_");
        assert_eq!(config.prediction.strategy, PredictionStrategy::Single);
        assert_eq!(config.prediction.internal_model, "rf");
        assert!(config.prediction.external_models.is_empty());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_path("does/not/exist.toml").unwrap();
        assert_eq!(config.output.comparison_report, "prediction_comparison_report.csv");
        assert_eq!(config.features.ph, 7.0);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[prediction]\nstrategy = \"ensemble\"\ninternal_model = \"svm\"\n\n[artifacts]\nmodels_dir = \"/opt/models\"\nscaler_path = \"\""
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.prediction.strategy, PredictionStrategy::Ensemble);
        assert_eq!(config.prediction.internal_model, "svm");
        assert_eq!(config.artifacts.models_dir, "/opt/models");
        assert_eq!(config.scaler_path(), None);
        // untouched sections keep their defaults
        assert_eq!(config.logging.level, "info");
    }
}
