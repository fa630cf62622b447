//! Feature contract validation.
//!
//! Every scoring call goes through [`validate`] and [`FeatureContract::project`]
//! so that models always see their training-time columns in training-time
//! order, whatever order the matrix happens to hold them in.

use crate::error::ContractError;
use crate::models::classifier::Classifier;
use crate::types::{FeatureMatrix, Projection, SchemaTrust};
use tracing::warn;

/// The ordered columns a model will be scored on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureContract {
    pub columns: Vec<String>,
    pub trust: SchemaTrust,
}

impl FeatureContract {
    /// Re-project `matrix` onto the contract's columns
    pub fn project(&self, matrix: &FeatureMatrix) -> Result<Projection, ContractError> {
        matrix.project(&self.columns)
    }
}

/// Determine the columns `model` requires and check that `matrix` has them.
///
/// A model without a declared schema is assumed to take every feature column
/// of the matrix, in matrix order; the contract is then marked
/// [`SchemaTrust::Inferred`].
pub fn validate(
    model: &dyn Classifier,
    matrix: &FeatureMatrix,
) -> Result<FeatureContract, ContractError> {
    let contract = match model.declared_features() {
        Some(features) => FeatureContract {
            columns: features.to_vec(),
            trust: SchemaTrust::Declared,
        },
        None => {
            warn!(
                columns = matrix.columns().len(),
                "Model declares no feature schema; assuming all matrix features in matrix order"
            );
            FeatureContract {
                columns: matrix.columns().to_vec(),
                trust: SchemaTrust::Inferred,
            }
        }
    };

    let missing: Vec<String> = contract
        .columns
        .iter()
        .filter(|c| !matrix.has_column(c))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ContractError::MissingFeatures { missing });
    }

    Ok(contract)
}
