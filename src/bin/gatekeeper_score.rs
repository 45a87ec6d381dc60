//! Scores one feature vector with a Gatekeeper artifact.
//!
//! # Usage
//! ```sh
//! cargo run --bin gatekeeper_score -- --model ml/gatekeeper_v1.onnx \
//!     --features 55.2,21.0,0.004,0.03,0.2,-0.1,1
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use gatekeeper::application::ml::scorer::{ApproveScorer, GraphScorer};
use gatekeeper::domain::ml::DecisionPolicy;
use gatekeeper::infrastructure::onnx::ArtifactReader;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the ONNX artifact
    #[arg(long, default_value = "ml/gatekeeper_v1.onnx")]
    model: PathBuf,

    /// Comma separated feature values, in schema order
    #[arg(long, required = true, value_delimiter = ',', allow_hyphen_values = true)]
    features: Vec<f64>,

    /// Approve threshold
    #[arg(long, default_value_t = DecisionPolicy::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Also score through ONNX Runtime and compare
    #[cfg(feature = "onnxruntime")]
    #[arg(long)]
    runtime: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    let policy = DecisionPolicy::new(args.threshold).context("Invalid --threshold")?;

    let artifact = ArtifactReader::default()
        .load(&args.model)
        .with_context(|| format!("Failed to load artifact {:?}", args.model))?;

    let names = artifact.feature_names();
    if let Some(width) = artifact.feature_count()
        && width != args.features.len()
    {
        anyhow::bail!(
            "Artifact expects {} features ({}), got {}",
            width,
            names.join(", "),
            args.features.len()
        );
    }

    let scorer = GraphScorer::new(artifact);
    let (p, decision) = scorer.decide(&args.features, &policy)?;

    println!("Model:     {} ({})", scorer.version(), scorer.name());
    println!("P(approve): {:.6}", p);
    println!("Decision:  {} (threshold {})", decision, policy.threshold());

    #[cfg(feature = "onnxruntime")]
    compare_with_runtime(&args, scorer.version(), p)?;

    Ok(())
}

#[cfg(feature = "onnxruntime")]
fn compare_with_runtime(args: &Args, version: &str, reference: f64) -> Result<()> {
    if !args.runtime {
        return Ok(());
    }
    let runtime = gatekeeper::infrastructure::onnx::OnnxRuntimeScorer::load(&args.model, version)?;
    let p = runtime.approve_probability(&args.features)?;
    println!(
        "ONNX Runtime P(approve): {:.6} (delta {:.2e})",
        p,
        (p - reference).abs()
    );
    Ok(())
}
