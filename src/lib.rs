//! AMP Identifier Library
//!
//! Classifies peptide sequences as antimicrobial (AMP) or not with one or
//! more trained classifiers and merges every model's output into a single
//! comparison report.

pub mod config;
pub mod error;
pub mod fasta;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod types;

pub use config::AppConfig;
pub use error::{PipelineError, RunError};
pub use feature_extractor::FeatureExtractor;
pub use pipeline::PredictionPipeline;
pub use report::{ComparisonReport, ReportMerger};
pub use types::{FeatureMatrix, ModelRunKey, PredictionResult, SequenceRecord};
