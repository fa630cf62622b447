//! Prediction pipeline: sequences in, comparison report out.
//!
//! Models are evaluated strictly one after another; each is loaded, scored
//! and dropped before the next is loaded. A model that fails at any stage is
//! recorded with its reason and the run continues. Only a run in which no
//! model succeeds is an error.

use crate::config::{AppConfig, PredictionStrategy};
use crate::error::{ArtifactLoadError, PipelineError, RunError};
use crate::fasta;
use crate::feature_extractor::FeatureExtractor;
use crate::metrics::RunMetrics;
use crate::models::classifier::Classifier;
use crate::models::loader::ModelLoader;
use crate::models::runner::ModelRunner;
use crate::models::scaler::Scaler;
use crate::report::{save_features_report, ComparisonReport, ReportMerger};
use crate::types::{FeatureMatrix, KeyRegistry, ModelOrigin, ModelRun, ModelRunKey, SchemaTrust};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Where a requested model comes from
pub enum ModelSource {
    /// Loaded from disk when its turn comes
    Artifact(PathBuf),
    /// Already in memory
    Loaded(Box<dyn Classifier>),
}

/// One model the run should evaluate
pub struct ModelRequest {
    pub key: ModelRunKey,
    pub source: ModelSource,
}

impl ModelRequest {
    pub fn artifact(key: ModelRunKey, path: impl Into<PathBuf>) -> Self {
        Self {
            key,
            source: ModelSource::Artifact(path.into()),
        }
    }

    pub fn loaded(key: ModelRunKey, model: Box<dyn Classifier>) -> Self {
        Self {
            key,
            source: ModelSource::Loaded(model),
        }
    }

    fn path(&self) -> Option<PathBuf> {
        match &self.source {
            ModelSource::Artifact(path) => Some(path.clone()),
            ModelSource::Loaded(_) => None,
        }
    }
}

/// The scaler internal models are scored with
pub enum InternalScaler {
    /// No scaler configured; internal models receive raw features
    Disabled,
    Ready(Box<dyn Scaler>),
    /// Configured but unusable; every internal model is skipped
    Unavailable(ArtifactLoadError),
}

impl InternalScaler {
    fn as_scaler(&self) -> Option<&dyn Scaler> {
        match self {
            InternalScaler::Ready(scaler) => Some(scaler.as_ref()),
            _ => None,
        }
    }
}

/// Outcome of one requested model
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ModelOutcome {
    Succeeded {
        trust: SchemaTrust,
        rows: usize,
        amp_predicted: usize,
    },
    Skipped {
        reason: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub key: String,
    pub origin: ModelOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(flatten)]
    pub outcome: ModelOutcome,
}

/// Machine-readable account of a run, written next to the reports
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub strategy: PredictionStrategy,
    pub sequences: usize,
    pub models: Vec<ModelStatus>,
}

impl RunSummary {
    /// Keys of requested models that are absent from the report
    pub fn skipped(&self) -> impl Iterator<Item = &ModelStatus> {
        self.models
            .iter()
            .filter(|m| matches!(m.outcome, ModelOutcome::Skipped { .. }))
    }

    /// Keys scored on an assumed rather than declared feature schema
    pub fn inferred_schema(&self) -> impl Iterator<Item = &ModelStatus> {
        self.models.iter().filter(|m| {
            matches!(
                m.outcome,
                ModelOutcome::Succeeded {
                    trust: SchemaTrust::Inferred,
                    ..
                }
            )
        })
    }
}

/// Successful runs plus the status of every requested model
pub struct Evaluation {
    pub runs: Vec<ModelRun>,
    pub statuses: Vec<ModelStatus>,
    /// Skip reasons, in request order
    pub skipped: Vec<(String, RunError)>,
}

impl Evaluation {
    /// Err when no model produced results
    fn into_result(self) -> Result<Self, PipelineError> {
        if self.runs.is_empty() {
            return Err(PipelineError::NoModelsSucceeded {
                skipped: self.skipped,
            });
        }
        Ok(self)
    }
}

/// Everything a completed run produced
pub struct PipelineOutcome {
    pub report: ComparisonReport,
    pub summary: RunSummary,
    pub metrics: RunMetrics,
    pub features_path: PathBuf,
    pub report_path: PathBuf,
    pub summary_path: PathBuf,
}

pub struct PredictionPipeline {
    config: AppConfig,
    loader: ModelLoader,
    extractor: FeatureExtractor,
    merger: ReportMerger,
}

impl PredictionPipeline {
    pub fn new(config: AppConfig) -> Self {
        let loader = ModelLoader::new(&config.artifacts);
        let extractor = FeatureExtractor::from_config(&config.features);
        Self {
            config,
            loader,
            extractor,
            merger: ReportMerger::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn ensemble(&self) -> bool {
        self.config.prediction.strategy == PredictionStrategy::Ensemble
    }

    /// Models selected by the configuration, internal first, with unique keys
    pub fn plan(&self) -> Vec<ModelRequest> {
        let mut registry = KeyRegistry::new();
        let mut requests = Vec::new();

        match self.config.prediction.strategy {
            PredictionStrategy::Ensemble => {
                info!("Mode: Ensemble Voting");
                let discovered = self.loader.discover_internal_models();
                if discovered.is_empty() {
                    warn!("No internal models found for ensemble mode");
                }
                for (name, path) in discovered {
                    let key = registry.register(ModelRunKey::internal(&name), Some(&path));
                    info!(model = %key.display_name(), path = %path.display(), "Using internal model");
                    requests.push(ModelRequest::artifact(key, path));
                }
            }
            PredictionStrategy::Single => {
                let name = &self.config.prediction.internal_model;
                let path = self.loader.internal_model_path(&name.to_lowercase());
                let key = registry.register(ModelRunKey::internal(name), Some(&path));
                info!(model = %key.display_name(), "Mode: Single Model");
                requests.push(ModelRequest::artifact(key, path));
            }
        }

        for raw in &self.config.prediction.external_models {
            let path = PathBuf::from(raw);
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| raw.clone());
            let key = registry.register(ModelRunKey::external(&stem), Some(&path));
            info!(model = %key, path = %path.display(), "Comparing with external model");
            requests.push(ModelRequest::artifact(key, path));
        }

        requests
    }

    /// Load the configured scaler
    pub fn load_scaler(&self) -> InternalScaler {
        match self.config.scaler_path() {
            None => {
                warn!("No scaler configured; internal models receive unscaled features");
                InternalScaler::Disabled
            }
            Some(path) => match self.loader.load_scaler(&path) {
                Ok(scaler) => InternalScaler::Ready(Box::new(scaler)),
                Err(e) => {
                    error!(error = %e, "Scaler unavailable; internal models will be skipped");
                    InternalScaler::Unavailable(e)
                }
            },
        }
    }

    /// Score every requested model against `matrix`.
    ///
    /// Fails only when no model produced results.
    pub fn evaluate(
        &self,
        matrix: &FeatureMatrix,
        requests: Vec<ModelRequest>,
        scaler: &InternalScaler,
        metrics: &mut RunMetrics,
    ) -> Result<Evaluation, PipelineError> {
        self.evaluate_all(matrix, requests, scaler, metrics).into_result()
    }

    fn evaluate_all(
        &self,
        matrix: &FeatureMatrix,
        requests: Vec<ModelRequest>,
        scaler: &InternalScaler,
        metrics: &mut RunMetrics,
    ) -> Evaluation {
        let runner = ModelRunner::new(scaler.as_scaler());
        let mut runs = Vec::new();
        let mut statuses = Vec::new();
        let mut skipped = Vec::new();

        for request in requests {
            let started = Instant::now();
            let key = request.key.clone();
            let source = request.path();

            let result = self.evaluate_one(&runner, request, matrix, scaler);

            match result {
                Ok(run) => {
                    if run.trust == SchemaTrust::Inferred {
                        warn!(model = %key, "Predictions rely on an inferred feature schema");
                    }
                    metrics.record_model(&run, started.elapsed());
                    statuses.push(ModelStatus {
                        key: key.to_string(),
                        origin: key.origin,
                        source,
                        outcome: ModelOutcome::Succeeded {
                            trust: run.trust,
                            rows: run.results.len(),
                            amp_predicted: run.amp_count(),
                        },
                    });
                    runs.push(run);
                }
                Err(e) => {
                    error!(model = %key, reason = e.reason(), error = %e, "Model skipped");
                    metrics.record_skip(&key, e.reason());
                    statuses.push(ModelStatus {
                        key: key.to_string(),
                        origin: key.origin,
                        source,
                        outcome: ModelOutcome::Skipped {
                            reason: e.reason(),
                            message: e.to_string(),
                        },
                    });
                    skipped.push((key.to_string(), e));
                }
            }
        }

        Evaluation {
            runs,
            statuses,
            skipped,
        }
    }

    fn evaluate_one(
        &self,
        runner: &ModelRunner<'_>,
        request: ModelRequest,
        matrix: &FeatureMatrix,
        scaler: &InternalScaler,
    ) -> Result<ModelRun, RunError> {
        if request.key.is_internal() {
            if let InternalScaler::Unavailable(e) = scaler {
                return Err(RunError::Artifact(e.clone()));
            }
        }

        let mut model = match request.source {
            ModelSource::Loaded(model) => model,
            ModelSource::Artifact(path) => self.loader.load_model(&path, &request.key.name)?,
        };
        runner.run(&request.key, model.as_mut(), matrix)
    }

    /// Build the comparison report from successful runs
    pub fn merge(&self, matrix: &FeatureMatrix, runs: &[ModelRun]) -> ComparisonReport {
        self.merger.merge(matrix.records(), runs, self.ensemble())
    }

    /// Run the whole pipeline for one FASTA file
    pub fn run(&self, input: &Path, output_dir: &Path) -> Result<PipelineOutcome, PipelineError> {
        let mut metrics = RunMetrics::new();
        let output = &self.config.output;

        info!(input = %input.display(), "Loading sequences");
        let records = fasta::load_fasta(input).map_err(|source| PipelineError::SequenceInput {
            path: input.to_path_buf(),
            source,
        })?;
        if records.is_empty() {
            return Err(PipelineError::EmptyInput {
                path: input.to_path_buf(),
            });
        }
        info!(count = records.len(), "Found sequences");
        metrics.record_sequences(records.len());

        std::fs::create_dir_all(output_dir).map_err(|e| PipelineError::Report {
            path: output_dir.to_path_buf(),
            source: e.into(),
        })?;

        info!(features = self.extractor.feature_count(), "Calculating physicochemical features");
        let matrix = self.extractor.build_matrix(records)?;

        let features_path = output_dir.join(&output.features_report);
        save_features_report(&matrix, &features_path).map_err(|source| PipelineError::Report {
            path: features_path.clone(),
            source,
        })?;
        info!(path = %features_path.display(), "Physicochemical features report saved");

        let requests = self.plan();
        let scaler = if requests.iter().any(|r| r.key.is_internal()) {
            self.load_scaler()
        } else {
            InternalScaler::Disabled
        };

        info!(models = requests.len(), "Running predictions");
        let summary_path = output_dir.join(&output.run_summary);
        let evaluation = self.evaluate_all(&matrix, requests, &scaler, &mut metrics);
        if evaluation.runs.is_empty() {
            let summary = self.summary(matrix.len(), evaluation.statuses);
            // best effort: the missing report is the error being returned
            if let Err(e) = write_summary(&summary, &summary_path) {
                warn!(error = %e, "Failed to write run summary");
            }
            return Err(PipelineError::NoModelsSucceeded {
                skipped: evaluation.skipped,
            });
        }

        info!("Generating comparison report");
        let report = self.merge(&matrix, &evaluation.runs);
        metrics.record_agreement(&report);

        let report_path = output_dir.join(&output.comparison_report);
        report.save(&report_path).map_err(|source| PipelineError::Report {
            path: report_path.clone(),
            source,
        })?;
        info!(path = %report_path.display(), "Comparison report saved");

        let summary = self.summary(matrix.len(), evaluation.statuses);
        for status in summary.skipped() {
            warn!(model = %status.key, "Requested model is absent from the comparison report");
        }
        write_summary(&summary, &summary_path).map_err(|source| PipelineError::Report {
            path: summary_path.clone(),
            source,
        })?;

        Ok(PipelineOutcome {
            report,
            summary,
            metrics,
            features_path,
            report_path,
            summary_path,
        })
    }

    fn summary(&self, sequences: usize, models: Vec<ModelStatus>) -> RunSummary {
        RunSummary {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            strategy: self.config.prediction.strategy.clone(),
            sequences,
            models,
        }
    }
}

fn write_summary(summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)?;
    Ok(())
}
