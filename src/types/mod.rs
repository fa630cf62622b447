//! Core data types shared by the prediction pipeline

pub mod matrix;
pub mod prediction;
pub mod sequence;

pub use matrix::{FeatureMatrix, Projection};
pub use prediction::{KeyRegistry, ModelOrigin, ModelRun, ModelRunKey, PredictionResult, SchemaTrust};
pub use sequence::SequenceRecord;
