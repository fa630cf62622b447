//! Per-model prediction results and the keys that label them

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Where a model comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelOrigin {
    /// One of the tool's own trained models; receives scaled input and votes
    Internal,
    /// Caller-supplied comparison model; receives raw input and never votes
    External,
}

impl ModelOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelOrigin::Internal => "internal",
            ModelOrigin::External => "external",
        }
    }
}

/// Label of one model's contribution to a run, e.g. `internal_rf`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRunKey {
    pub origin: ModelOrigin,
    pub name: String,
}

impl ModelRunKey {
    /// Internal model names are lower-cased for column naming
    pub fn internal(name: &str) -> Self {
        Self {
            origin: ModelOrigin::Internal,
            name: name.to_lowercase(),
        }
    }

    pub fn external(name: &str) -> Self {
        Self {
            origin: ModelOrigin::External,
            name: name.to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.origin == ModelOrigin::Internal
    }

    /// Upper-cased name for log output (`RF`, `SVM`)
    pub fn display_name(&self) -> String {
        self.name.to_uppercase()
    }

    /// `pred_<key>` report column
    pub fn prediction_column(&self) -> String {
        format!("pred_{}", self)
    }

    /// `prob_<key>` report column
    pub fn probability_column(&self) -> String {
        format!("prob_{}", self)
    }
}

impl fmt::Display for ModelRunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.origin.as_str(), self.name)
    }
}

/// Hands out run keys that are unique within one pipeline run.
///
/// A clashing name is first qualified with its source's parent directory,
/// then suffixed with a counter. Registration order decides who keeps the
/// plain name.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    taken: HashSet<String>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: ModelRunKey, source: Option<&Path>) -> ModelRunKey {
        if self.claim(&key) {
            return key;
        }

        let parent = source
            .and_then(Path::parent)
            .and_then(Path::file_name)
            .map(|p| sanitize(&p.to_string_lossy()))
            .filter(|p| !p.is_empty());

        let base = match parent {
            Some(parent) => {
                let qualified = ModelRunKey {
                    origin: key.origin,
                    name: format!("{}_{}", parent, key.name),
                };
                if self.claim(&qualified) {
                    return qualified;
                }
                qualified.name
            }
            None => key.name.clone(),
        };

        let mut n = 2;
        loop {
            let candidate = ModelRunKey {
                origin: key.origin,
                name: format!("{}_{}", base, n),
            };
            if self.claim(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn claim(&mut self, key: &ModelRunKey) -> bool {
        self.taken.insert(key.to_string())
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

/// How a model's feature list was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaTrust {
    /// The artifact declared the features it was trained on
    Declared,
    /// No declaration; all non-identity matrix columns were assumed
    Inferred,
}

/// One model's verdict for one sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "ID")]
    pub id: String,
    pub sequence: String,
    /// 1 = AMP, 0 = non-AMP
    pub prediction: u8,
    /// Probability mass on the AMP class
    #[serde(rename = "probability_AMP")]
    pub probability_amp: f64,
}

/// Results of one successful model evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRun {
    pub key: ModelRunKey,
    pub trust: SchemaTrust,
    pub results: Vec<PredictionResult>,
}

impl ModelRun {
    pub fn amp_count(&self) -> usize {
        self.results.iter().filter(|r| r.prediction == 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formatting() {
        let key = ModelRunKey::internal("RF");
        assert_eq!(key.to_string(), "internal_rf");
        assert_eq!(key.display_name(), "RF");
        assert_eq!(key.prediction_column(), "pred_internal_rf");
        assert_eq!(key.probability_column(), "prob_internal_rf");

        let key = ModelRunKey::external("camp_svm");
        assert_eq!(key.to_string(), "external_camp_svm");
        assert!(!key.is_internal());
    }

    #[test]
    fn test_registry_keeps_first_name() {
        let mut registry = KeyRegistry::new();
        let first = registry.register(
            ModelRunKey::external("model"),
            Some(Path::new("/data/lab_a/model.onnx")),
        );
        assert_eq!(first.to_string(), "external_model");
    }

    #[test]
    fn test_registry_disambiguates_by_parent_directory() {
        let mut registry = KeyRegistry::new();
        registry.register(
            ModelRunKey::external("model"),
            Some(Path::new("/data/lab_a/model.onnx")),
        );
        let second = registry.register(
            ModelRunKey::external("model"),
            Some(Path::new("/data/lab b/model.onnx")),
        );
        assert_eq!(second.to_string(), "external_lab_b_model");
    }

    #[test]
    fn test_registry_falls_back_to_counter() {
        let mut registry = KeyRegistry::new();
        let path = Path::new("/data/lab_a/model.onnx");
        registry.register(ModelRunKey::external("model"), Some(path));
        let second = registry.register(ModelRunKey::external("model"), Some(path));
        let third = registry.register(ModelRunKey::external("model"), Some(path));
        let fourth = registry.register(ModelRunKey::external("model"), None);
        assert_eq!(second.to_string(), "external_lab_a_model");
        assert_eq!(third.to_string(), "external_lab_a_model_2");
        assert_eq!(fourth.to_string(), "external_model_2");
    }

    #[test]
    fn test_internal_and_external_names_do_not_collide() {
        let mut registry = KeyRegistry::new();
        let internal = registry.register(ModelRunKey::internal("rf"), None);
        let external = registry.register(ModelRunKey::external("rf"), None);
        assert_eq!(internal.to_string(), "internal_rf");
        assert_eq!(external.to_string(), "external_rf");
    }
}
