//! Binary classifier capability and the artifact formats that provide it

use crate::types::Projection;
use anyhow::{bail, Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Index of the AMP class in per-class probability rows
pub const AMP_CLASS_INDEX: usize = 1;

/// A trained binary classifier.
///
/// Inputs are always an explicit, ordered projection; implementations must
/// not reorder or drop rows.
pub trait Classifier: Send {
    /// Features the model was trained on, in training order, if known
    fn declared_features(&self) -> Option<&[String]>;

    /// Discrete class per row
    fn predict(&mut self, input: &Projection) -> Result<Vec<i64>>;

    /// Per-class probabilities per row, class 0 first
    fn predict_proba(&mut self, input: &Projection) -> Result<Vec<Vec<f64>>>;

    /// Labels and probabilities for `input`.
    ///
    /// Models that produce both in one inference call should override this.
    fn score(&mut self, input: &Projection) -> Result<Scores> {
        Ok(Scores {
            labels: self.predict(input)?,
            probabilities: self.predict_proba(input)?,
        })
    }
}

/// Both classifier outputs for one input
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub labels: Vec<i64>,
    pub probabilities: Vec<Vec<f64>>,
}

/// Logistic-regression coefficients exported as JSON.
///
/// ```json
/// { "feature_names": ["Charge", "pI"], "coefficients": [1.2, 0.4], "intercept": -3.1 }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticClassifier {
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    coefficients: Vec<f64>,
    #[serde(default)]
    intercept: f64,
}

impl LogisticClassifier {
    pub fn new(feature_names: Option<Vec<String>>, coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        let model = Self {
            feature_names,
            coefficients,
            intercept,
        };
        model.check()?;
        Ok(model)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file {}", path.display()))?;
        let model: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse logistic model {}", path.display()))?;
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<()> {
        if let Some(names) = &self.feature_names {
            if names.len() != self.coefficients.len() {
                bail!(
                    "{} feature names for {} coefficients",
                    names.len(),
                    self.coefficients.len()
                );
            }
        }
        Ok(())
    }

    fn probability(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            bail!(
                "model expects {} features, got {}",
                self.coefficients.len(),
                row.len()
            );
        }
        let z: f64 = self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>();
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}

impl Classifier for LogisticClassifier {
    fn declared_features(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(&mut self, input: &Projection) -> Result<Vec<i64>> {
        input
            .rows
            .iter()
            .map(|row| Ok(i64::from(self.probability(row)? > 0.5)))
            .collect()
    }

    fn predict_proba(&mut self, input: &Projection) -> Result<Vec<Vec<f64>>> {
        input
            .rows
            .iter()
            .map(|row| {
                let p = self.probability(row)?;
                Ok(vec![1.0 - p, p])
            })
            .collect()
    }
}

/// ONNX classifier as exported by sklearn-onnx (`label` + `probabilities`).
pub struct OnnxClassifier {
    name: String,
    session: Session,
    input_name: String,
    label_output: Option<String>,
    probability_output: String,
    features: Option<Vec<String>>,
}

impl OnnxClassifier {
    /// Load an ONNX model; `features` comes from the schema side-channel, if any
    pub fn load<P: AsRef<Path>>(
        path: P,
        name: &str,
        features: Option<Vec<String>>,
        threads: usize,
    ) -> Result<Self> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.iter().find(|o| !o.name.contains("label")))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        if label_output.is_none() {
            warn!(model = %name, "Model has no label output; labels are thresholded at 0.5");
        }

        info!(
            model = %name,
            input = %input_name,
            label = ?label_output,
            probabilities = %probability_output,
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            session,
            input_name,
            label_output,
            probability_output,
            features,
        })
    }

    fn run(&mut self, input: &Projection) -> Result<Scores> {
        let rows = input.n_rows();
        let shape = vec![rows as i64, input.n_features() as i64];
        let tensor = Tensor::from_array((shape, input.to_f32_row_major()))
            .context("Failed to create input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])?;

        let output = outputs
            .get(self.probability_output.as_str())
            .with_context(|| format!("Model has no output named `{}`", self.probability_output))?;
        let probabilities = extract_probabilities(output, rows, &self.name)?;

        // an unreadable label output fails the run
        let labels = match &self.label_output {
            Some(name) => {
                let output = outputs
                    .get(name.as_str())
                    .with_context(|| format!("Model has no output named `{}`", name))?;
                extract_labels(output, rows, name)?
            }
            None => threshold_labels(&probabilities),
        };

        Ok(Scores {
            labels,
            probabilities,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn declared_features(&self) -> Option<&[String]> {
        self.features.as_deref()
    }

    fn predict(&mut self, input: &Projection) -> Result<Vec<i64>> {
        self.run(input).map(|scores| scores.labels)
    }

    fn predict_proba(&mut self, input: &Projection) -> Result<Vec<Vec<f64>>> {
        self.run(input).map(|scores| scores.probabilities)
    }

    fn score(&mut self, input: &Projection) -> Result<Scores> {
        self.run(input)
    }
}

fn threshold_labels(probabilities: &[Vec<f64>]) -> Vec<i64> {
    probabilities
        .iter()
        .map(|p| i64::from(p.get(AMP_CLASS_INDEX).copied().unwrap_or(0.0) > 0.5))
        .collect()
}

/// int64 label tensor, one value per row
fn extract_labels(output: &DynValue, rows: usize, output_name: &str) -> Result<Vec<i64>> {
    let (_, data) = output
        .try_extract_tensor::<i64>()
        .with_context(|| format!("Label output `{}` is not an int64 tensor", output_name))?;
    if data.len() != rows {
        bail!("Label output `{}` has {} values for {} rows", output_name, data.len(), rows);
    }
    Ok(data.to_vec())
}

/// Handles both tensor outputs `[rows, classes]` and seq(map(int64, float))
fn extract_probabilities(output: &DynValue, rows: usize, model_name: &str) -> Result<Vec<Vec<f64>>> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        let classes = match dims.as_slice() {
            [_, classes] => *classes as usize,
            [_] => 1,
            other => bail!("Unexpected probability shape {:?}", other),
        };
        if classes == 0 || data.len() != rows * classes {
            bail!("Probability output has {} values for {} rows", data.len(), rows);
        }
        debug!(model = %model_name, classes = classes, "Extracted probabilities from tensor");
        return Ok(data
            .chunks(classes)
            .map(|chunk| match chunk {
                // single-column output holds the positive-class probability
                [p] => vec![1.0 - *p as f64, *p as f64],
                _ => chunk.iter().map(|&p| p as f64).collect(),
            })
            .collect());
    }

    if DynSequenceValueType::can_downcast(&output.dtype()) {
        return extract_from_sequence_map(output, model_name);
    }

    bail!("Unsupported probability output type for `{}`", model_name)
}

/// seq(map(int64, float)) as produced by sklearn-onnx with zipmap enabled
fn extract_from_sequence_map(output: &DynValue, model_name: &str) -> Result<Vec<Vec<f64>>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    let mut rows = Vec::with_capacity(maps.len());
    for map_value in &maps {
        let mut pairs = map_value.try_extract_key_values::<i64, f32>()?;
        pairs.sort_by_key(|(class_id, _)| *class_id);
        let max_class = pairs.last().map(|(c, _)| *c).unwrap_or(-1);
        if max_class < 0 {
            bail!("Empty class map");
        }
        let mut row = vec![0.0; max_class as usize + 1];
        for (class_id, prob) in pairs {
            if class_id >= 0 {
                row[class_id as usize] = prob as f64;
            }
        }
        rows.push(row);
    }

    debug!(model = %model_name, rows = rows.len(), "Extracted probabilities from seq(map)");
    Ok(rows)
}
