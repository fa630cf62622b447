//! Comparison report assembly and report files

use crate::models::aggregator::EnsembleAggregator;
use crate::types::matrix::{ID_COLUMN, SEQUENCE_COLUMN};
use crate::types::{FeatureMatrix, ModelRun, ModelRunKey, PredictionResult, SequenceRecord};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const ENSEMBLE_VOTE_SUM_COLUMN: &str = "ensemble_vote_sum";
pub const ENSEMBLE_PREDICTION_COLUMN: &str = "ensemble_prediction";

/// One model's values in a report row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelCell {
    pub prediction: u8,
    pub probability_amp: f64,
}

/// Ensemble values in a report row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsembleCell {
    pub vote_sum: u32,
    pub prediction: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub id: String,
    pub sequence: String,
    /// One entry per model key; `None` when the model has no result for this ID
    pub models: Vec<Option<ModelCell>>,
    pub ensemble: Option<EnsembleCell>,
}

/// Wide table with one row per input sequence and a column pair per model
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    keys: Vec<ModelRunKey>,
    has_ensemble: bool,
    rows: Vec<ReportRow>,
}

impl ComparisonReport {
    /// Model keys in column order
    pub fn keys(&self) -> &[ModelRunKey] {
        &self.keys
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn has_ensemble(&self) -> bool {
        self.has_ensemble
    }

    /// `ID, sequence, pred_<key>, prob_<key>, ..., [ensemble columns]`
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![ID_COLUMN.to_string(), SEQUENCE_COLUMN.to_string()];
        for key in &self.keys {
            columns.push(key.prediction_column());
            columns.push(key.probability_column());
        }
        if self.has_ensemble {
            columns.push(ENSEMBLE_VOTE_SUM_COLUMN.to_string());
            columns.push(ENSEMBLE_PREDICTION_COLUMN.to_string());
        }
        columns
    }

    /// Value of `key` for sequence `id`
    pub fn cell(&self, id: &str, key: &ModelRunKey) -> Option<ModelCell> {
        let col = self.keys.iter().position(|k| k == key)?;
        self.rows.iter().find(|r| r.id == id)?.models[col]
    }

    /// Write as CSV; missing results are empty fields
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.columns())?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(2 + 2 * self.keys.len() + 2);
            record.push(row.id.clone());
            record.push(row.sequence.clone());
            for cell in &row.models {
                match cell {
                    Some(cell) => {
                        record.push(cell.prediction.to_string());
                        record.push(cell.probability_amp.to_string());
                    }
                    None => {
                        record.push(String::new());
                        record.push(String::new());
                    }
                }
            }
            if let Some(ensemble) = &row.ensemble {
                record.push(ensemble.vote_sum.to_string());
                record.push(ensemble.prediction.to_string());
            }
            csv.write_record(&record)?;
        }

        csv.flush()?;
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_csv(file)
    }
}

/// Left-joins model runs onto the input sequences
#[derive(Debug, Default)]
pub struct ReportMerger {
    aggregator: EnsembleAggregator,
}

impl ReportMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the comparison report.
    ///
    /// `base` fixes the rows and their order. Columns follow the order of
    /// `runs`. Ensemble columns are added only when requested and at least one
    /// internal run is present.
    pub fn merge(
        &self,
        base: &[SequenceRecord],
        runs: &[ModelRun],
        include_ensemble: bool,
    ) -> ComparisonReport {
        let lookups: Vec<HashMap<&str, &PredictionResult>> = runs
            .iter()
            .map(|run| {
                let mut by_id = HashMap::with_capacity(run.results.len());
                for result in &run.results {
                    by_id.entry(result.id.as_str()).or_insert(result);
                }
                by_id
            })
            .collect();

        let has_ensemble =
            include_ensemble && EnsembleAggregator::voter_count(runs.iter()) > 0;
        let votes: HashMap<String, EnsembleCell> = if has_ensemble {
            self.aggregator
                .aggregate(runs)
                .into_iter()
                .map(|v| {
                    (
                        v.id,
                        EnsembleCell {
                            vote_sum: v.vote_sum,
                            prediction: v.prediction,
                        },
                    )
                })
                .collect()
        } else {
            HashMap::new()
        };

        let rows = base
            .iter()
            .map(|record| ReportRow {
                id: record.id.clone(),
                sequence: record.sequence.clone(),
                models: lookups
                    .iter()
                    .map(|by_id| {
                        by_id.get(record.id.as_str()).map(|r| ModelCell {
                            prediction: r.prediction,
                            probability_amp: r.probability_amp,
                        })
                    })
                    .collect(),
                // no internal result at all for this row means no AMP votes
                ensemble: has_ensemble.then(|| {
                    votes.get(&record.id).copied().unwrap_or(EnsembleCell {
                        vote_sum: 0,
                        prediction: 0,
                    })
                }),
            })
            .collect();

        ComparisonReport {
            keys: runs.iter().map(|r| r.key.clone()).collect(),
            has_ensemble,
            rows,
        }
    }
}

/// Write the feature matrix as CSV: `ID, sequence, <features...>`
pub fn write_features_report<W: Write>(matrix: &FeatureMatrix, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![ID_COLUMN.to_string(), SEQUENCE_COLUMN.to_string()];
    header.extend(matrix.columns().iter().cloned());
    csv.write_record(&header)?;

    for (i, record) in matrix.records().iter().enumerate() {
        let mut fields = vec![record.id.clone(), record.sequence.clone()];
        if let Some(row) = matrix.row(i) {
            fields.extend(row.iter().map(|v| v.to_string()));
        }
        csv.write_record(&fields)?;
    }

    csv.flush()?;
    Ok(())
}

pub fn save_features_report<P: AsRef<Path>>(matrix: &FeatureMatrix, path: P) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_features_report(matrix, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SchemaTrust;

    fn base() -> Vec<SequenceRecord> {
        vec![
            SequenceRecord::new("s1", "GLFDIVKK"),
            SequenceRecord::new("s2", "KWKLFKKI"),
            SequenceRecord::new("s3", "DDEEDDEE"),
        ]
    }

    fn run(key: ModelRunKey, rows: &[(&str, u8, f64)]) -> ModelRun {
        ModelRun {
            key,
            trust: SchemaTrust::Declared,
            results: rows
                .iter()
                .map(|&(id, prediction, probability_amp)| PredictionResult {
                    id: id.to_string(),
                    sequence: String::new(),
                    prediction,
                    probability_amp,
                })
                .collect(),
        }
    }

    #[test]
    fn test_single_model_values_are_carried_unchanged() {
        let key = ModelRunKey::internal("rf");
        let runs = vec![run(
            key.clone(),
            &[("s1", 1, 0.91), ("s2", 0, 0.12), ("s3", 0, 0.03)],
        )];
        let report = ReportMerger::new().merge(&base(), &runs, false);

        assert_eq!(
            report.columns(),
            vec!["ID", "sequence", "pred_internal_rf", "prob_internal_rf"]
        );
        for result in &runs[0].results {
            let cell = report.cell(&result.id, &key).unwrap();
            assert_eq!(cell.prediction, result.prediction);
            assert_eq!(cell.probability_amp, result.probability_amp);
        }
        assert!(!report.has_ensemble());
    }

    #[test]
    fn test_left_join_keeps_every_base_row() {
        let runs = vec![
            run(ModelRunKey::internal("rf"), &[("s2", 1, 0.8)]),
            run(ModelRunKey::external("camp"), &[("s3", 0, 0.2), ("unknown", 1, 0.9)]),
        ];
        let report = ReportMerger::new().merge(&base(), &runs, false);

        let ids: Vec<&str> = report.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
        assert_eq!(report.rows()[0].models, vec![None, None]);
        assert!(report.rows()[1].models[0].is_some());
        assert!(report.rows()[1].models[1].is_none());

        let empty = ReportMerger::new().merge(&base(), &[], false);
        assert_eq!(empty.rows().len(), 3);
        assert_eq!(empty.columns(), vec!["ID", "sequence"]);
    }

    #[test]
    fn test_ensemble_columns_exclude_external_votes() {
        let runs = vec![
            run(ModelRunKey::external("aaa"), &[("s1", 1, 0.9), ("s2", 1, 0.9), ("s3", 1, 0.9)]),
            run(ModelRunKey::internal("gb"), &[("s1", 1, 0.7), ("s2", 0, 0.4), ("s3", 0, 0.1)]),
            run(ModelRunKey::internal("rf"), &[("s1", 1, 0.8), ("s2", 1, 0.6), ("s3", 0, 0.2)]),
        ];
        let report = ReportMerger::new().merge(&base(), &runs, true);

        assert_eq!(
            report.columns(),
            vec![
                "ID",
                "sequence",
                "pred_external_aaa",
                "prob_external_aaa",
                "pred_internal_gb",
                "prob_internal_gb",
                "pred_internal_rf",
                "prob_internal_rf",
                "ensemble_vote_sum",
                "ensemble_prediction",
            ]
        );
        let ensemble: Vec<(u32, u8)> = report
            .rows()
            .iter()
            .map(|r| r.ensemble.map(|e| (e.vote_sum, e.prediction)).unwrap())
            .collect();
        // s2 is a 1-1 tie between internal models
        assert_eq!(ensemble, vec![(2, 1), (1, 0), (0, 0)]);
    }

    #[test]
    fn test_no_ensemble_without_internal_runs() {
        let runs = vec![run(ModelRunKey::external("camp"), &[("s1", 1, 0.9)])];
        let report = ReportMerger::new().merge(&base(), &runs, true);
        assert!(!report.has_ensemble());
        assert!(report.rows().iter().all(|r| r.ensemble.is_none()));
    }

    #[test]
    fn test_csv_output() {
        let runs = vec![
            run(ModelRunKey::internal("rf"), &[("s1", 1, 0.75), ("s2", 0, 0.25)]),
            run(ModelRunKey::internal("svm"), &[("s1", 1, 0.5)]),
        ];
        let report = ReportMerger::new().merge(&base(), &runs, true);
        let mut out = Vec::new();
        report.write_csv(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "ID,sequence,pred_internal_rf,prob_internal_rf,pred_internal_svm,prob_internal_svm,ensemble_vote_sum,ensemble_prediction"
        );
        assert_eq!(lines[1], "s1,GLFDIVKK,1,0.75,1,0.5,2,1");
        assert_eq!(lines[2], "s2,KWKLFKKI,0,0.25,,,0,0");
        assert_eq!(lines[3], "s3,DDEEDDEE,,,,,0,0");
    }

    #[test]
    fn test_features_report() {
        let matrix = FeatureMatrix::new(
            vec![SequenceRecord::new("s1", "KK")],
            vec!["Length".into(), "Charge".into()],
            vec![vec![2.0, 1.5]],
        )
        .unwrap();
        let mut out = Vec::new();
        write_features_report(&matrix, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ID,sequence,Length,Charge\ns1,KK,2,1.5\n"
        );
    }
}
