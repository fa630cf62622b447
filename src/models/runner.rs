//! Scores one classifier against a feature matrix

use crate::error::RunError;
use crate::models::classifier::{Classifier, Scores, AMP_CLASS_INDEX};
use crate::models::contract::{self, FeatureContract};
use crate::models::scaler::{apply_scaler, Scaler};
use crate::types::{FeatureMatrix, ModelRun, ModelRunKey, PredictionResult, Projection};
use tracing::debug;

/// Runs models one at a time against a shared, read-only matrix.
///
/// The scaler is applied to internal models only. External models always
/// receive the raw projection.
pub struct ModelRunner<'a> {
    scaler: Option<&'a dyn Scaler>,
}

impl<'a> ModelRunner<'a> {
    pub fn new(scaler: Option<&'a dyn Scaler>) -> Self {
        Self { scaler }
    }

    /// Runner that never scales
    pub fn unscaled() -> Self {
        Self { scaler: None }
    }

    /// Validate the contract and build the exact input `model` would be scored on
    pub fn prepare(
        &self,
        key: &ModelRunKey,
        model: &dyn Classifier,
        matrix: &FeatureMatrix,
    ) -> Result<(FeatureContract, Projection), RunError> {
        let contract = contract::validate(model, matrix)?;
        let projection = contract.project(matrix)?;

        let scaler = if key.is_internal() { self.scaler } else { None };
        let projection = apply_scaler(scaler, projection)?;

        Ok((contract, projection))
    }

    /// Score every row of `matrix`, preserving row order and IDs
    pub fn run(
        &self,
        key: &ModelRunKey,
        model: &mut dyn Classifier,
        matrix: &FeatureMatrix,
    ) -> Result<ModelRun, RunError> {
        let (contract, input) = self.prepare(key, &*model, matrix)?;

        let Scores {
            labels,
            probabilities,
        } = model
            .score(&input)
            .map_err(|e| RunError::Inference(format!("{:#}", e)))?;

        let rows = matrix.len();
        if labels.len() != rows || probabilities.len() != rows {
            return Err(RunError::Inference(format!(
                "model returned {} labels and {} probability rows for {} sequences",
                labels.len(),
                probabilities.len(),
                rows
            )));
        }

        let mut results = Vec::with_capacity(rows);
        for ((record, label), proba) in matrix.records().iter().zip(labels).zip(probabilities) {
            let prediction = match label {
                0 => 0,
                1 => 1,
                other => {
                    return Err(RunError::Inference(format!(
                        "label {} for `{}` is not a binary class",
                        other, record.id
                    )))
                }
            };
            let probability_amp = proba.get(AMP_CLASS_INDEX).copied().ok_or_else(|| {
                RunError::Inference(format!(
                    "{} class probabilities for `{}`; the AMP class needs index {}",
                    proba.len(),
                    record.id,
                    AMP_CLASS_INDEX
                ))
            })?;
            if !(0.0..=1.0).contains(&probability_amp) {
                return Err(RunError::Inference(format!(
                    "AMP probability {} for `{}` is outside [0, 1]",
                    probability_amp, record.id
                )));
            }

            results.push(PredictionResult {
                id: record.id.clone(),
                sequence: record.sequence.clone(),
                prediction,
                probability_amp,
            });
        }

        debug!(model = %key, rows = results.len(), trust = ?contract.trust, "Model scored");

        Ok(ModelRun {
            key: key.clone(),
            trust: contract.trust,
            results,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{ContractError, ScalerError};
    use crate::models::classifier::LogisticClassifier;
    use crate::models::scaler::StandardScaler;
    use crate::types::{SchemaTrust, SequenceRecord};
    use anyhow::Result;

    /// Returns fixed votes and records the input it was scored on
    pub(crate) struct FixedClassifier {
        pub features: Option<Vec<String>>,
        pub votes: Vec<i64>,
        pub seen: Option<Projection>,
    }

    impl FixedClassifier {
        pub(crate) fn new(features: &[&str], votes: Vec<i64>) -> Self {
            Self {
                features: Some(features.iter().map(|s| s.to_string()).collect()),
                votes,
                seen: None,
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn declared_features(&self) -> Option<&[String]> {
            self.features.as_deref()
        }

        fn predict(&mut self, input: &Projection) -> Result<Vec<i64>> {
            self.seen = Some(input.clone());
            Ok(self.votes.clone())
        }

        fn predict_proba(&mut self, _input: &Projection) -> Result<Vec<Vec<f64>>> {
            Ok(self
                .votes
                .iter()
                .map(|&v| if v == 1 { vec![0.2, 0.8] } else { vec![0.9, 0.1] })
                .collect())
        }
    }

    /// Answers only through `score` and counts how often it is asked
    struct SinglePassClassifier {
        calls: usize,
    }

    impl Classifier for SinglePassClassifier {
        fn declared_features(&self) -> Option<&[String]> {
            None
        }

        fn predict(&mut self, _input: &Projection) -> Result<Vec<i64>> {
            anyhow::bail!("labels come from score")
        }

        fn predict_proba(&mut self, _input: &Projection) -> Result<Vec<Vec<f64>>> {
            anyhow::bail!("probabilities come from score")
        }

        fn score(&mut self, input: &Projection) -> Result<Scores> {
            self.calls += 1;
            Ok(Scores {
                labels: vec![1; input.n_rows()],
                probabilities: vec![vec![0.3, 0.7]; input.n_rows()],
            })
        }
    }

    pub(crate) fn matrix() -> FeatureMatrix {
        FeatureMatrix::new(
            vec![
                SequenceRecord::new("test_seq_1", "ACDE"),
                SequenceRecord::new("test_seq_2", "NPQR"),
            ],
            vec!["feature1".into(), "feature2".into()],
            vec![vec![1.5, 0.1], vec![10.5, 4.9]],
        )
        .unwrap()
    }

    #[test]
    fn test_run_preserves_ids_and_order() {
        let mut model = LogisticClassifier::new(
            Some(vec!["feature1".into(), "feature2".into()]),
            vec![1.0, 0.5],
            -6.0,
        )
        .unwrap();
        let run = ModelRunner::unscaled()
            .run(&ModelRunKey::internal("lr"), &mut model, &matrix())
            .unwrap();

        let ids: Vec<&str> = run.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["test_seq_1", "test_seq_2"]);
        assert_eq!(run.results[0].prediction, 0);
        assert_eq!(run.results[1].prediction, 1);
        assert!(run.results[0].probability_amp < 0.5);
        assert!(run.results[1].probability_amp > 0.5);
        assert_eq!(run.results[1].sequence, "NPQR");
        assert_eq!(run.trust, SchemaTrust::Declared);
    }

    #[test]
    fn test_model_is_scored_in_one_pass() {
        let mut model = SinglePassClassifier { calls: 0 };
        let run = ModelRunner::unscaled()
            .run(&ModelRunKey::external("onnx_like"), &mut model, &matrix())
            .unwrap();
        assert_eq!(model.calls, 1);
        assert_eq!(run.trust, SchemaTrust::Inferred);
        assert!(run.results.iter().all(|r| r.prediction == 1 && r.probability_amp == 0.7));
    }

    #[test]
    fn test_missing_feature_is_a_contract_error() {
        let mut model = FixedClassifier::new(&["feature1", "feature3"], vec![1, 1]);
        let err = ModelRunner::unscaled()
            .run(&ModelRunKey::internal("rf"), &mut model, &matrix())
            .unwrap_err();
        assert_eq!(
            err,
            RunError::Contract(ContractError::MissingFeatures {
                missing: vec!["feature3".into()]
            })
        );
        assert!(model.seen.is_none());
    }

    #[test]
    fn test_scaler_dimension_error_skips_the_model() {
        let scaler = StandardScaler::new(None, vec![0.0; 3], vec![1.0; 3]).unwrap();
        let mut model = FixedClassifier::new(&["feature1", "feature2"], vec![1, 0]);
        let err = ModelRunner::new(Some(&scaler))
            .run(&ModelRunKey::internal("svm"), &mut model, &matrix())
            .unwrap_err();
        assert_eq!(
            err,
            RunError::Scaler(ScalerError::Dimension {
                expected: 3,
                actual: 2
            })
        );
        // never scored on unscaled input as a fallback
        assert!(model.seen.is_none());
    }

    #[test]
    fn test_scaler_applies_to_internal_models_only() {
        let scaler = StandardScaler::new(None, vec![1.0, 0.0], vec![0.5, 1.0]).unwrap();
        let runner = ModelRunner::new(Some(&scaler));
        let matrix = matrix();

        let mut internal = FixedClassifier::new(&["feature1", "feature2"], vec![1, 0]);
        let mut external = FixedClassifier::new(&["feature1", "feature2"], vec![1, 0]);
        runner
            .run(&ModelRunKey::internal("rf"), &mut internal, &matrix)
            .unwrap();
        runner
            .run(&ModelRunKey::external("camp"), &mut external, &matrix)
            .unwrap();

        let scaled = internal.seen.unwrap();
        let raw = external.seen.unwrap();
        assert_eq!(scaled.rows[0], vec![1.0, 0.1]);
        assert_eq!(raw.rows[0], vec![1.5, 0.1]);
        assert_ne!(scaled, raw);
        // the shared matrix is untouched
        assert_eq!(matrix.value(0, "feature1"), Some(1.5));
    }

    #[test]
    fn test_non_binary_label_is_an_inference_error() {
        let mut model = FixedClassifier::new(&["feature1"], vec![2, 0]);
        let err = ModelRunner::unscaled()
            .run(&ModelRunKey::external("odd"), &mut model, &matrix())
            .unwrap_err();
        assert_eq!(err.reason(), "inference");
    }

    #[test]
    fn test_row_count_mismatch_is_an_inference_error() {
        let mut model = FixedClassifier::new(&["feature1"], vec![1]);
        let err = ModelRunner::unscaled()
            .run(&ModelRunKey::external("short"), &mut model, &matrix())
            .unwrap_err();
        assert!(matches!(err, RunError::Inference(_)));
    }
}
