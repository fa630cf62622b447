//! Artifact loading and internal model discovery

use crate::config::ArtifactsConfig;
use crate::error::ArtifactLoadError;
use crate::models::classifier::{Classifier, LogisticClassifier, OnnxClassifier};
use crate::models::scaler::StandardScaler;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of the side-channel file declaring an ONNX model's features
pub const SCHEMA_SUFFIX: &str = ".features.json";

/// Loader for model and scaler artifacts
pub struct ModelLoader {
    models_dir: PathBuf,
    model_prefix: String,
    model_extensions: Vec<String>,
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaFile {
    List(Vec<String>),
    Object { feature_names: Vec<String> },
}

impl ModelLoader {
    pub fn new(config: &ArtifactsConfig) -> Self {
        Self {
            models_dir: PathBuf::from(&config.models_dir),
            model_prefix: config.model_prefix.clone(),
            model_extensions: config.model_extensions.clone(),
            onnx_threads: 1,
        }
    }

    pub fn with_threads(mut self, onnx_threads: usize) -> Self {
        self.onnx_threads = onnx_threads.max(1);
        self
    }

    /// Load any supported model artifact, chosen by file extension
    pub fn load_model(&self, path: &Path, name: &str) -> Result<Box<dyn Classifier>, ArtifactLoadError> {
        if !path.is_file() {
            return Err(ArtifactLoadError::new(path, "file not found"));
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let model: Result<Box<dyn Classifier>> = match extension.as_str() {
            "onnx" => self.load_onnx(path, name).map(|m| Box::new(m) as Box<dyn Classifier>),
            "json" => LogisticClassifier::from_file(path).map(|m| Box::new(m) as Box<dyn Classifier>),
            other => Err(anyhow::anyhow!("unsupported model format `{}`", other)),
        };

        let model = model.map_err(|e| ArtifactLoadError::from_anyhow(path, &e))?;
        debug!(model = %name, path = %path.display(), "Model artifact loaded");
        Ok(model)
    }

    fn load_onnx(&self, path: &Path, name: &str) -> Result<OnnxClassifier> {
        let features = read_schema(&schema_path(path))?;
        if features.is_none() {
            warn!(
                model = %name,
                schema = %schema_path(path).display(),
                "No feature schema file next to ONNX model"
            );
        }
        OnnxClassifier::load(path, name, features, self.onnx_threads)
    }

    /// Load the fitted scaler
    pub fn load_scaler(&self, path: &Path) -> Result<StandardScaler, ArtifactLoadError> {
        if !path.is_file() {
            return Err(ArtifactLoadError::new(path, "file not found"));
        }
        let scaler =
            StandardScaler::from_file(path).map_err(|e| ArtifactLoadError::from_anyhow(path, &e))?;
        info!(path = %path.display(), "Scaler loaded successfully");
        Ok(scaler)
    }

    /// Path of the internal model `name`: the first existing file over the
    /// configured extensions, otherwise the path for the first extension.
    pub fn internal_model_path(&self, name: &str) -> PathBuf {
        let candidates: Vec<PathBuf> = self
            .model_extensions
            .iter()
            .map(|ext| self.models_dir.join(format!("{}{}.{}", self.model_prefix, name, ext)))
            .collect();

        candidates
            .iter()
            .find(|p| p.is_file())
            .or_else(|| candidates.first())
            .cloned()
            .unwrap_or_else(|| self.models_dir.join(format!("{}{}", self.model_prefix, name)))
    }

    /// All internal models in the models directory, sorted by name.
    ///
    /// When a name exists in several formats the earliest configured
    /// extension wins.
    pub fn discover_internal_models(&self) -> Vec<(String, PathBuf)> {
        let entries = match std::fs::read_dir(&self.models_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.models_dir.display(), error = %e, "Cannot read models directory");
                return Vec::new();
            }
        };

        let mut found: Vec<(String, usize, PathBuf)> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter_map(|path| {
                let file_name = path.file_name()?.to_str()?.to_string();
                if file_name.ends_with(SCHEMA_SUFFIX) {
                    return None;
                }
                let stem = file_name.strip_prefix(&self.model_prefix)?;
                let (name, ext) = stem.rsplit_once('.')?;
                let rank = self
                    .model_extensions
                    .iter()
                    .position(|e| e.eq_ignore_ascii_case(ext))?;
                (!name.is_empty()).then(|| (name.to_string(), rank, path.clone()))
            })
            .collect();

        found.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        found.dedup_by(|later, earlier| later.0 == earlier.0);

        info!(
            count = found.len(),
            dir = %self.models_dir.display(),
            "Discovered internal models"
        );

        found.into_iter().map(|(name, _, path)| (name, path)).collect()
    }
}

/// `<dir>/<stem>.features.json` for `<dir>/<stem>.<ext>`
pub fn schema_path(model_path: &Path) -> PathBuf {
    let stem = model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    model_path.with_file_name(format!("{}{}", stem, SCHEMA_SUFFIX))
}

/// Read a schema file; absent is `None`, unreadable or malformed is an error
fn read_schema(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    let schema: SchemaFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse schema file {}", path.display()))?;
    Ok(Some(match schema {
        SchemaFile::List(names) | SchemaFile::Object { feature_names: names } => names,
    }))
}
