//! AMP Identifier - command-line entry point
//!
//! Loads sequences, computes descriptors, runs the selected internal and
//! external models and writes the feature and comparison reports.

use amp_identifier::config::{AppConfig, LoggingConfig, PredictionStrategy};
use amp_identifier::PredictionPipeline;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// AMP Identifier: antimicrobial peptide prediction and model comparison.
#[derive(Debug, Parser)]
#[command(name = "amp-identifier", version, about)]
struct Args {
    /// Input sequences (FASTA)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for the result files (created if missing)
    #[arg(short, long = "output-dir", alias = "output_dir")]
    output_dir: PathBuf,

    /// Internal model to use in single-model mode (e.g. rf, svm, gb)
    #[arg(short, long)]
    model: Option<String>,

    /// Use every internal model and predict by majority vote
    #[arg(long)]
    ensemble: bool,

    /// External models to compare against
    #[arg(short, long = "external-models", alias = "external_models", num_args = 0..)]
    external_models: Vec<String>,

    /// Configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    config: PathBuf,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.prediction.internal_model = model.clone();
        }
        if self.ensemble {
            config.prediction.strategy = PredictionStrategy::Ensemble;
        }
        if !self.external_models.is_empty() {
            config.prediction.external_models = self.external_models.clone();
        }
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("amp_identifier={}", logging.level).parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_from_path(&args.config)?;
    args.apply(&mut config);
    init_logging(&config.logging)?;

    info!("Starting AMP Identification Pipeline");
    if args.ensemble && args.model.is_some() {
        warn!("--model is ignored in ensemble mode");
    }

    let pipeline = PredictionPipeline::new(config);
    match pipeline.run(&args.input, &args.output_dir) {
        Ok(outcome) => {
            outcome.metrics.print_summary();
            info!(
                report = %outcome.report_path.display(),
                summary = %outcome.summary_path.display(),
                "Pipeline finished successfully"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Pipeline failed");
            Err(e.into())
        }
    }
}
