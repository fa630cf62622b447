//! Per-run statistics for model evaluation.

use crate::report::ComparisonReport;
use crate::types::{ModelRun, ModelRunKey};
use std::time::{Duration, Instant};
use tracing::info;

/// Timing and outcome of one model evaluation
#[derive(Debug, Clone)]
pub struct ModelStats {
    pub key: ModelRunKey,
    pub duration: Duration,
    pub rows: usize,
    pub amp_predicted: usize,
}

impl ModelStats {
    /// Fraction of rows predicted as AMP
    pub fn amp_rate(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.amp_predicted as f64 / self.rows as f64
        }
    }
}

/// Metrics collector for one pipeline run
#[derive(Debug)]
pub struct RunMetrics {
    start_time: Instant,
    sequences: usize,
    models: Vec<ModelStats>,
    skipped: Vec<(ModelRunKey, &'static str)>,
    agreement: Option<f64>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            sequences: 0,
            models: Vec::new(),
            skipped: Vec::new(),
            agreement: None,
        }
    }

    pub fn record_sequences(&mut self, count: usize) {
        self.sequences = count;
    }

    /// Record a successful model evaluation
    pub fn record_model(&mut self, run: &ModelRun, duration: Duration) {
        self.models.push(ModelStats {
            key: run.key.clone(),
            duration,
            rows: run.results.len(),
            amp_predicted: run.amp_count(),
        });
    }

    /// Record a model that contributed nothing
    pub fn record_skip(&mut self, key: &ModelRunKey, reason: &'static str) {
        self.skipped.push((key.clone(), reason));
    }

    /// Record how often the reported models agree
    pub fn record_agreement(&mut self, report: &ComparisonReport) {
        self.agreement = model_agreement(report);
    }

    pub fn models(&self) -> &[ModelStats] {
        &self.models
    }

    pub fn skipped(&self) -> &[(ModelRunKey, &'static str)] {
        &self.skipped
    }

    pub fn agreement(&self) -> Option<f64> {
        self.agreement
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              AMP PREDICTION - RUN SUMMARY                    ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Sequences: {:>8}  │  Models run: {:>3}  │  Skipped: {:>3}     ║",
            self.sequences,
            self.models.len(),
            self.skipped.len()
        );
        info!(
            "║ Elapsed: {:>10.3} s                                         ║",
            self.elapsed().as_secs_f64()
        );
        if let Some(agreement) = self.agreement {
            info!(
                "║ Model Agreement: {:>5.1}% of sequences                        ║",
                agreement * 100.0
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        for stats in &self.models {
            info!(
                "║   {:<28} AMP {:>6} ({:>5.1}%) {:>8.1} ms",
                stats.key.to_string(),
                stats.amp_predicted,
                stats.amp_rate() * 100.0,
                stats.duration.as_secs_f64() * 1000.0
            );
        }
        for (key, reason) in &self.skipped {
            info!("║   {:<28} skipped ({})", key.to_string(), reason);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of rows on which every model with a result gives the same class.
///
/// `None` with fewer than two models; rows with fewer than two results are
/// left out.
pub fn model_agreement(report: &ComparisonReport) -> Option<f64> {
    if report.keys().len() < 2 {
        return None;
    }

    let mut compared = 0usize;
    let mut agreed = 0usize;
    for row in report.rows() {
        let predictions: Vec<u8> = row.models.iter().flatten().map(|c| c.prediction).collect();
        if predictions.len() < 2 {
            continue;
        }
        compared += 1;
        if predictions.iter().all(|&p| p == predictions[0]) {
            agreed += 1;
        }
    }

    (compared > 0).then(|| agreed as f64 / compared as f64)
}
