//! Gatekeeper training pipeline.
//!
//! Loads the feature export, fits the logistic Gatekeeper, writes the ONNX
//! decision graph and records the version in the model registry.
//!
//! # Usage
//! ```sh
//! cargo run --bin train_gatekeeper -- --output ml/gatekeeper_v1.onnx
//! ```
//!
//! # Environment Variables
//! - `GATEKEEPER_INPUT` / `GATEKEEPER_OUTPUT` - dataset and artifact paths
//! - `GATEKEEPER_SEED`, `GATEKEEPER_TEST_FRACTION`, `GATEKEEPER_CLASS_WEIGHT` - training
//! - `GATEKEEPER_DATABASE_URL` - model registry (default: sqlite://data/gatekeeper.db)

use anyhow::{Context, Result};
use clap::Parser;
use gatekeeper::application::ml::pipeline::{GatekeeperPipeline, record_in_registry};
use gatekeeper::application::ml::trainer::ClassWeighting;
use gatekeeper::config::PipelineConfig;
use gatekeeper::domain::errors::{DatasetError, GatekeeperError};
use gatekeeper::domain::ml::FeatureSchema;
use gatekeeper::infrastructure::persistence::{Database, SqliteModelRegistry};
use std::path::PathBuf;
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the exported feature CSV
    #[arg(long)]
    input: Option<PathBuf>,

    /// Path to output ONNX artifact
    #[arg(long)]
    output: Option<PathBuf>,

    /// Version tag stamped into the artifact and the registry
    #[arg(long)]
    version_tag: Option<String>,

    /// TOML feature schema (default: built-in gatekeeper_v1)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Seed for the train/test split and synthetic data
    #[arg(long)]
    seed: Option<u64>,

    /// Held-out fraction
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Weight classes by inverse frequency
    #[arg(long)]
    balanced: bool,

    /// Standardize features before fitting (folded into the exported weights)
    #[arg(long)]
    standardize: bool,

    /// Fail instead of training on synthetic data when the dataset is missing
    #[arg(long)]
    no_synthetic_fallback: bool,

    /// Fail instead of writing a placeholder artifact when export fails
    #[arg(long)]
    no_placeholder_fallback: bool,

    /// Model registry database URL
    #[arg(long)]
    database_url: Option<String>,

    /// Do not record the artifact in the model registry
    #[arg(long)]
    skip_registry: bool,
}

impl Args {
    fn apply(self, config: &mut PipelineConfig) -> Result<()> {
        if let Some(input) = self.input {
            config.input_path = input;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(tag) = self.version_tag {
            config.version_tag = tag;
        }
        if let Some(path) = self.schema {
            config.schema = FeatureSchema::from_toml_file(&path)
                .with_context(|| format!("Failed to load feature schema {}", path.display()))?;
            config.schema_path = Some(path);
        }
        if let Some(seed) = self.seed {
            config.training.seed = seed;
        }
        if let Some(fraction) = self.test_fraction {
            if !(fraction > 0.0 && fraction < 1.0) {
                anyhow::bail!("--test-fraction must be strictly between 0 and 1");
            }
            config.training.test_fraction = fraction;
        }
        if self.balanced {
            config.training.class_weighting = ClassWeighting::Balanced;
        }
        if self.standardize {
            config.training.standardize = true;
        }
        if self.no_synthetic_fallback {
            config.synthetic_fallback = false;
        }
        if self.no_placeholder_fallback {
            config.placeholder_fallback = false;
        }
        if let Some(url) = self.database_url {
            config.registry.database_url = url;
        }
        if self.skip_registry {
            config.registry.enabled = false;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = PipelineConfig::from_env().context("Failed to load configuration")?;
    Args::parse().apply(&mut config)?;

    println!(
        "Training Gatekeeper {} ({} features) from {:?}",
        config.version_tag,
        config.schema.feature_count(),
        config.input_path
    );

    let pipeline = GatekeeperPipeline::new(
        config.schema.clone(),
        config.trainer_config(),
        config.export_config(),
    );

    let outcome = match pipeline.run(&config.pipeline_options()) {
        Ok(outcome) => outcome,
        Err(GatekeeperError::Dataset(DatasetError::NotFound { path })) => {
            eprintln!(
                "Training data not found at {}. Regenerate the feature export, or drop --no-synthetic-fallback to train on synthetic data.",
                path
            );
            anyhow::bail!("dataset missing and synthetic fallback disabled");
        }
        Err(e) => return Err(e).context("Gatekeeper pipeline failed"),
    };

    let policy = config.decision_policy()?;
    if let Some(report) = &outcome.report {
        println!(
            "Trained on {} rows ({}), held out {}: AUC {}",
            report.train_rows, outcome.source, report.test_rows, report.auc
        );
        println!("Held-out @{}: {}", policy.threshold(), report.confusion);
    }
    if let Some(reason) = &outcome.write.degraded {
        println!("WARNING: wrote PLACEHOLDER artifact ({})", reason);
    }
    println!(
        "Saved {} artifact to {:?} ({} bytes)",
        outcome.kind(),
        outcome.write.path,
        outcome.write.bytes
    );
    if let Some(path) = &outcome.report_path {
        println!("Run summary: {:?}", path);
    }

    if config.registry.enabled {
        match Database::new(&config.registry.database_url).await {
            Ok(db) => {
                let registry = SqliteModelRegistry::new(db.pool.clone());
                record_in_registry(&registry, &outcome, &config.version_tag).await;
            }
            Err(e) => warn!("Model registry unavailable (ignored): {:#}", e),
        }
    } else {
        info!("Model registry disabled");
    }

    Ok(())
}
