//! Feature matrix keyed by sequence ID

use crate::error::{ContractError, MatrixError};
use crate::types::sequence::SequenceRecord;
use std::collections::{HashMap, HashSet};

/// Identity column holding the sequence ID
pub const ID_COLUMN: &str = "ID";
/// Identity column holding the raw sequence
pub const SEQUENCE_COLUMN: &str = "sequence";

/// Numeric features for a set of sequences.
///
/// Rows follow the order of the records the matrix was built from. Feature
/// columns never include the identity columns, and values are always finite:
/// missing or non-finite inputs are stored as `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    records: Vec<SequenceRecord>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
    column_index: HashMap<String, usize>,
}

impl FeatureMatrix {
    /// Build a matrix from records and row-major feature values.
    pub fn new(
        records: Vec<SequenceRecord>,
        columns: Vec<String>,
        mut values: Vec<Vec<f64>>,
    ) -> Result<Self, MatrixError> {
        if records.len() != values.len() {
            return Err(MatrixError::RowCount {
                records: records.len(),
                rows: values.len(),
            });
        }

        let mut column_index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if name == ID_COLUMN || name == SEQUENCE_COLUMN {
                return Err(MatrixError::ReservedColumn(name.clone()));
            }
            if column_index.insert(name.clone(), i).is_some() {
                return Err(MatrixError::DuplicateColumn(name.clone()));
            }
        }

        let mut seen = HashSet::with_capacity(records.len());
        for (record, row) in records.iter().zip(values.iter_mut()) {
            if !seen.insert(record.id.as_str()) {
                return Err(MatrixError::DuplicateId(record.id.clone()));
            }
            if row.len() != columns.len() {
                return Err(MatrixError::RowWidth {
                    id: record.id.clone(),
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
            for value in row.iter_mut() {
                if !value.is_finite() {
                    *value = 0.0;
                }
            }
        }

        Ok(Self {
            records,
            columns,
            values,
            column_index,
        })
    }

    /// Number of rows (sequences)
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Identity records in row order
    pub fn records(&self) -> &[SequenceRecord] {
        &self.records
    }

    /// Feature column names, excluding `ID` and `sequence`
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    /// Feature values of one row, in column order
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.values.get(index).map(Vec::as_slice)
    }

    /// Value of a named feature for one row
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let col = *self.column_index.get(column)?;
        self.values.get(row).map(|r| r[col])
    }

    /// Select `columns` in the given order.
    ///
    /// Every requested column must exist; the error lists all that don't.
    pub fn project(&self, columns: &[String]) -> Result<Projection, ContractError> {
        let mut indices = Vec::with_capacity(columns.len());
        let mut missing = Vec::new();
        for name in columns {
            match self.column_index.get(name) {
                Some(&i) => indices.push(i),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(ContractError::MissingFeatures { missing });
        }

        let rows = self
            .values
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect();

        Ok(Projection {
            columns: columns.to_vec(),
            rows,
        })
    }
}

/// An ordered column subset of a [`FeatureMatrix`], ready for scoring.
///
/// Owned, so scaling one model's projection never touches another's.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl Projection {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Row-major `f32` buffer, the layout ONNX classifiers take as input
    pub fn to_f32_row_major(&self) -> Vec<f32> {
        self.rows
            .iter()
            .flat_map(|row| row.iter().map(|&v| v as f32))
            .collect()
    }
}
