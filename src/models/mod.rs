//! Model evaluation components

pub mod aggregator;
pub mod classifier;
pub mod contract;
pub mod loader;
pub mod runner;
pub mod scaler;

pub use aggregator::{EnsembleAggregator, EnsembleVote};
pub use classifier::{Classifier, LogisticClassifier, OnnxClassifier, Scores};
pub use contract::FeatureContract;
pub use loader::ModelLoader;
pub use runner::ModelRunner;
pub use scaler::{Scaler, StandardScaler};
