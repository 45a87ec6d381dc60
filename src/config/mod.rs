//! Configuration module for the Gatekeeper pipeline.
//!
//! Settings are read from `GATEKEEPER_*` environment variables (a `.env` file
//! is loaded by the binaries first) and grouped by concern: training,
//! registry and the artifact paths. Command line flags override them.

mod registry_config;
mod training_config;

pub use registry_config::{DEFAULT_DATABASE_URL, RegistryEnvConfig};
pub use training_config::TrainingEnvConfig;

use crate::application::ml::exporter::ExportConfig;
use crate::application::ml::loader::{DEFAULT_SYNTHETIC_ROWS, SyntheticFallback};
use crate::application::ml::pipeline::PipelineOptions;
use crate::application::ml::trainer::TrainerConfig;
use crate::domain::ml::contract::DEFAULT_VERSION_TAG;
use crate::domain::ml::{DecisionPolicy, FeatureSchema};
use anyhow::{Context, Result};
#[cfg(test)]
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_INPUT_PATH: &str = "ml/data_export.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "ml/gatekeeper_v1.onnx";

/// Where configuration values are looked up.
///
/// `Process` reads the real environment; `Map` lets tests supply values
/// without mutating process-wide state.
#[derive(Debug, Clone)]
pub(crate) enum EnvSource {
    Process,
    #[cfg(test)]
    Map(HashMap<String, String>),
}

impl EnvSource {
    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        EnvSource::Map(HashMap::new())
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        EnvSource::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub(crate) fn get(&self, key: &str) -> Option<String> {
        match self {
            EnvSource::Process => env::var(key).ok(),
            #[cfg(test)]
            EnvSource::Map(map) => map.get(key).cloned(),
        }
        .filter(|v| !v.trim().is_empty())
    }

    fn raw(&self, key: &str, default: impl ToString) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub(crate) fn parse_usize(&self, key: &str, default: usize) -> Result<usize> {
        self.raw(key, default)
            .trim()
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    pub(crate) fn parse_u64(&self, key: &str, default: u64) -> Result<u64> {
        self.raw(key, default)
            .trim()
            .parse::<u64>()
            .context(format!("Failed to parse {}", key))
    }

    pub(crate) fn parse_f64(&self, key: &str, default: f64) -> Result<f64> {
        self.raw(key, default)
            .trim()
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }

    pub(crate) fn parse_bool(&self, key: &str, default: bool) -> bool {
        self.raw(key, default)
            .trim()
            .to_lowercase()
            .parse::<bool>()
            .unwrap_or(default)
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub version_tag: String,
    pub schema_path: Option<PathBuf>,
    pub schema: FeatureSchema,
    pub synthetic_rows: usize,
    pub synthetic_fallback: bool,
    pub placeholder_fallback: bool,
    pub threshold: f64,
    pub training: TrainingEnvConfig,
    pub registry: RegistryEnvConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            version_tag: DEFAULT_VERSION_TAG.to_string(),
            schema_path: None,
            schema: FeatureSchema::gatekeeper_v1(),
            synthetic_rows: DEFAULT_SYNTHETIC_ROWS,
            synthetic_fallback: true,
            placeholder_fallback: true,
            threshold: DecisionPolicy::DEFAULT_THRESHOLD,
            training: TrainingEnvConfig::default(),
            registry: RegistryEnvConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource::Process)
    }

    pub(crate) fn from_source(source: &EnvSource) -> Result<Self> {
        let schema_path = source.get("GATEKEEPER_SCHEMA").map(PathBuf::from);
        let schema = match &schema_path {
            Some(path) => FeatureSchema::from_toml_file(path)
                .with_context(|| format!("Failed to load feature schema {}", path.display()))?,
            None => FeatureSchema::gatekeeper_v1(),
        };

        let threshold = source.parse_f64("GATEKEEPER_THRESHOLD", DecisionPolicy::DEFAULT_THRESHOLD)?;
        DecisionPolicy::new(threshold).context("Invalid GATEKEEPER_THRESHOLD")?;

        let synthetic_rows = source.parse_usize("GATEKEEPER_SYNTHETIC_ROWS", DEFAULT_SYNTHETIC_ROWS)?;
        if synthetic_rows < 2 {
            anyhow::bail!(
                "GATEKEEPER_SYNTHETIC_ROWS must be at least 2, got {}",
                synthetic_rows
            );
        }

        Ok(Self {
            input_path: PathBuf::from(source.raw("GATEKEEPER_INPUT", DEFAULT_INPUT_PATH)),
            output_path: PathBuf::from(source.raw("GATEKEEPER_OUTPUT", DEFAULT_OUTPUT_PATH)),
            version_tag: source.raw("GATEKEEPER_VERSION_TAG", DEFAULT_VERSION_TAG),
            schema_path,
            schema,
            synthetic_rows,
            synthetic_fallback: source.parse_bool("GATEKEEPER_SYNTHETIC_FALLBACK", true),
            placeholder_fallback: source.parse_bool("GATEKEEPER_PLACEHOLDER_FALLBACK", true),
            threshold,
            training: TrainingEnvConfig::from_source(source)
                .context("Failed to load training config")?,
            registry: RegistryEnvConfig::from_source(source),
        })
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            eval_threshold: self.threshold,
            ..self.training.trainer_config()
        }
    }

    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            version_tag: self.version_tag.clone(),
            ..ExportConfig::default()
        }
    }

    /// Synthetic rows share the training seed so one knob reproduces a run.
    pub fn synthetic_fallback(&self) -> Option<SyntheticFallback> {
        self.synthetic_fallback.then_some(SyntheticFallback {
            rows: self.synthetic_rows,
            seed: self.training.seed,
        })
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
            synthetic_fallback: self.synthetic_fallback(),
            placeholder_fallback: self.placeholder_fallback,
            write_report: true,
        }
    }

    pub fn decision_policy(&self) -> Result<DecisionPolicy> {
        DecisionPolicy::new(self.threshold).context("Invalid decision threshold")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::from_source(&EnvSource::empty()).unwrap();
        assert_eq!(config.input_path, PathBuf::from("ml/data_export.csv"));
        assert_eq!(config.output_path, PathBuf::from("ml/gatekeeper_v1.onnx"));
        assert_eq!(config.version_tag, "gatekeeper_v1");
        assert_eq!(config.schema, FeatureSchema::gatekeeper_v1());
        assert!(config.synthetic_fallback);
        assert!(config.placeholder_fallback);
        assert!((config.threshold - 0.5).abs() < f64::EPSILON);

        let fallback = config.synthetic_fallback().unwrap();
        assert_eq!(fallback.rows, 100);
        assert_eq!(fallback.seed, 42);
    }

    #[test]
    fn test_disabled_fallbacks_propagate_to_options() {
        let source = EnvSource::from_pairs(&[
            ("GATEKEEPER_SYNTHETIC_FALLBACK", "false"),
            ("GATEKEEPER_PLACEHOLDER_FALLBACK", "FALSE"),
            ("GATEKEEPER_OUTPUT", "out/model.onnx"),
        ]);
        let options = PipelineConfig::from_source(&source)
            .unwrap()
            .pipeline_options();
        assert!(options.synthetic_fallback.is_none());
        assert!(!options.placeholder_fallback);
        assert_eq!(options.output_path, PathBuf::from("out/model.onnx"));
    }

    #[test]
    fn test_threshold_is_validated() {
        let source = EnvSource::from_pairs(&[("GATEKEEPER_THRESHOLD", "1.5")]);
        assert!(PipelineConfig::from_source(&source).is_err());

        let source = EnvSource::from_pairs(&[("GATEKEEPER_THRESHOLD", "0.65")]);
        let config = PipelineConfig::from_source(&source).unwrap();
        assert!((config.trainer_config().eval_threshold - 0.65).abs() < f64::EPSILON);
        assert!((config.decision_policy().unwrap().threshold() - 0.65).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_schema_file_is_an_error() {
        let source = EnvSource::from_pairs(&[("GATEKEEPER_SCHEMA", "no/such/schema.toml")]);
        assert!(PipelineConfig::from_source(&source).is_err());
    }

    #[test]
    fn test_version_tag_flows_into_export_config() {
        let source = EnvSource::from_pairs(&[("GATEKEEPER_VERSION_TAG", "gatekeeper_v2")]);
        let config = PipelineConfig::from_source(&source).unwrap();
        assert_eq!(config.export_config().version_tag, "gatekeeper_v2");
        assert_eq!(config.export_config().opset_version, 22);
    }
}
