//! Normalization transforms applied ahead of internal models

use crate::error::ScalerError;
use crate::types::Projection;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// A fitted, read-only normalization transform
pub trait Scaler: Send + Sync {
    /// Number of columns the transform was fitted on
    fn input_dimensionality(&self) -> usize;

    /// Fitted column names, in order, if the artifact records them
    fn feature_names(&self) -> Option<&[String]>;

    /// Transform already-checked rows; column names and row order are kept
    fn transform_rows(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>>;
}

/// Scale `projection` with `scaler`, or pass it through when there is none.
///
/// The projection's columns must match the fitted columns exactly: same count,
/// and same names in the same order when the scaler recorded them.
pub fn apply_scaler(
    scaler: Option<&dyn Scaler>,
    projection: Projection,
) -> Result<Projection, ScalerError> {
    let Some(scaler) = scaler else {
        return Ok(projection);
    };

    let expected = scaler.input_dimensionality();
    if expected != projection.n_features() {
        return Err(ScalerError::Dimension {
            expected,
            actual: projection.n_features(),
        });
    }

    if let Some(fitted) = scaler.feature_names() {
        if let Some((position, (want, got))) = fitted
            .iter()
            .zip(&projection.columns)
            .enumerate()
            .find(|(_, (want, got))| want != got)
        {
            return Err(ScalerError::ColumnMismatch {
                position,
                expected: want.clone(),
                actual: got.clone(),
            });
        }
    }

    let rows = scaler.transform_rows(&projection.rows);
    Ok(Projection {
        columns: projection.columns,
        rows,
    })
}

/// Standardization `(x - mean) / scale`, exported from a fitted StandardScaler.
///
/// ```json
/// { "feature_names": ["Length", "MW"], "mean": [18.2, 2011.5], "scale": [6.1, 640.2] }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(feature_names: Option<Vec<String>>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let scaler = Self {
            feature_names,
            mean,
            scale,
        };
        scaler.check()?;
        Ok(scaler)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler file {}", path.display()))?;
        let scaler: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse scaler file {}", path.display()))?;
        scaler.check()?;
        Ok(scaler)
    }

    fn check(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            bail!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            );
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.mean.len() {
                bail!(
                    "scaler lists {} feature names for {} columns",
                    names.len(),
                    self.mean.len()
                );
            }
        }
        Ok(())
    }
}

impl Scaler for StandardScaler {
    fn input_dimensionality(&self) -> usize {
        self.mean.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn transform_rows(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(x, (mean, scale))| {
                        // zero-variance columns are only centred
                        let scale = if *scale == 0.0 { 1.0 } else { *scale };
                        (x - mean) / scale
                    })
                    .collect()
            })
            .collect()
    }
}
