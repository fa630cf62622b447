//! Error taxonomy for model evaluation and pipeline runs.
//!
//! Per-model errors ([`RunError`] and the errors it wraps) only ever remove one
//! model from a run. [`PipelineError`] is reserved for the conditions that end a
//! run.

use std::path::PathBuf;
use thiserror::Error;

/// The feature matrix does not satisfy a model's feature contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("matrix is missing {} required feature(s): {}", .missing.len(), .missing.join(", "))]
    MissingFeatures { missing: Vec<String> },
}

/// The scaler cannot be applied to the projected columns
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScalerError {
    #[error("scaler was fitted on {expected} features but {actual} were supplied")]
    Dimension { expected: usize, actual: usize },
    #[error("scaler column {position} is `{expected}` but the model projects `{actual}`")]
    ColumnMismatch {
        position: usize,
        expected: String,
        actual: String,
    },
}

/// A feature matrix violates its structural invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("{records} records but {rows} feature rows")]
    RowCount { records: usize, rows: usize },
    #[error("row `{id}` has {actual} values for {expected} columns")]
    RowWidth {
        id: String,
        expected: usize,
        actual: usize,
    },
    #[error("duplicate sequence ID `{0}`")]
    DuplicateId(String),
    #[error("duplicate feature column `{0}`")]
    DuplicateColumn(String),
    #[error("`{0}` is an identity column and cannot be a feature")]
    ReservedColumn(String),
}

/// A model or scaler artifact could not be loaded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load artifact {}: {reason}", .path.display())]
pub struct ArtifactLoadError {
    pub path: PathBuf,
    pub reason: String,
}

impl ArtifactLoadError {
    pub fn new(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build from an `anyhow` chain, keeping every context layer in the reason
    pub fn from_anyhow(path: impl Into<PathBuf>, error: &anyhow::Error) -> Self {
        Self::new(path, format!("{:#}", error))
    }
}

/// Why a single model contributed nothing to a run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("feature contract: {0}")]
    Contract(#[from] ContractError),
    #[error("scaler: {0}")]
    Scaler(#[from] ScalerError),
    #[error("artifact: {0}")]
    Artifact(#[from] ArtifactLoadError),
    #[error("inference: {0}")]
    Inference(String),
}

impl RunError {
    /// Short machine-readable reason, used in run summaries
    pub fn reason(&self) -> &'static str {
        match self {
            RunError::Contract(_) => "contract",
            RunError::Scaler(_) => "scaler",
            RunError::Artifact(_) => "artifact",
            RunError::Inference(_) => "inference",
        }
    }
}

/// Conditions that terminate a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no sequences were loaded from {}", .path.display())]
    EmptyInput { path: PathBuf },

    #[error("failed to read sequences from {}: {source:#}", .path.display())]
    SequenceInput {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("none of the {} requested model(s) produced results", .skipped.len())]
    NoModelsSucceeded { skipped: Vec<(String, RunError)> },

    #[error("invalid feature matrix: {0}")]
    Matrix(#[from] MatrixError),

    #[error("failed to write report {}: {source:#}", .path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_feature_message_lists_columns() {
        let err = ContractError::MissingFeatures {
            missing: vec!["MW".to_string(), "pI".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "matrix is missing 2 required feature(s): MW, pI"
        );
    }

    #[test]
    fn test_run_error_reason() {
        let contract: RunError = ContractError::MissingFeatures { missing: vec![] }.into();
        let scaler: RunError = ScalerError::Dimension {
            expected: 3,
            actual: 2,
        }
        .into();
        assert_eq!(contract.reason(), "contract");
        assert_eq!(scaler.reason(), "scaler");
        assert_eq!(RunError::Inference("bad".into()).reason(), "inference");
    }
}
