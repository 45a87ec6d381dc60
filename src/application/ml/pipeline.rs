//! Loader -> Trainer -> Exporter -> Writer, as one synchronous pass.

use super::exporter::{ExportConfig, GraphExporter};
use super::loader::{DataSource, FeatureFrameLoader, SyntheticFallback};
use super::trainer::{Trainer, TrainerConfig, TrainingReport};
use crate::domain::errors::GatekeeperError;
use crate::domain::ml::contract::meta;
use crate::domain::ml::{ArtifactKind, FeatureSchema};
use crate::domain::repositories::{ModelRegistry, ModelRegistryEntry, RegistrationStatus};
use crate::infrastructure::onnx::writer::write_atomic;
use crate::infrastructure::onnx::{ArtifactWriter, WriteOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// `None` turns a missing dataset into a run-ending error.
    pub synthetic_fallback: Option<SyntheticFallback>,
    /// Write a placeholder artifact when training, export or the write fails.
    pub placeholder_fallback: bool,
    pub write_report: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub source: DataSource,
    /// Absent when training itself failed and a placeholder was written.
    pub report: Option<TrainingReport>,
    pub write: WriteOutcome,
    pub report_path: Option<PathBuf>,
}

impl PipelineOutcome {
    pub fn kind(&self) -> ArtifactKind {
        self.write.kind
    }
}

/// Sidecar written next to the artifact as `<artifact>.report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub version_tag: String,
    pub artifact_kind: ArtifactKind,
    pub artifact_bytes: usize,
    pub data_source: String,
    pub synthetic_data: bool,
    pub degraded: Option<String>,
    pub created_at: DateTime<Utc>,
    pub training: Option<TrainingReport>,
}

pub fn report_path_for(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".report.json");
    PathBuf::from(name)
}

pub struct GatekeeperPipeline {
    loader: FeatureFrameLoader,
    trainer: Trainer,
    exporter: GraphExporter,
    writer: ArtifactWriter,
}

impl GatekeeperPipeline {
    pub fn new(schema: FeatureSchema, trainer: TrainerConfig, export: ExportConfig) -> Self {
        Self {
            loader: FeatureFrameLoader::new(schema),
            trainer: Trainer::new(trainer),
            exporter: GraphExporter::new(export),
            writer: ArtifactWriter::new(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.loader.schema()
    }

    pub fn version_tag(&self) -> &str {
        &self.exporter.config().version_tag
    }

    pub fn run(&self, options: &PipelineOptions) -> Result<PipelineOutcome, GatekeeperError> {
        let schema = self.loader.schema();
        info!(
            "Gatekeeper pipeline: schema {} ({} features), output {:?}",
            schema.version,
            schema.feature_count(),
            options.output_path
        );

        let loaded = self
            .loader
            .load_or_synthesize(&options.input_path, options.synthetic_fallback)?;
        info!("Training data: {}", loaded.source);

        let mut report = None;
        let trained = self
            .trainer
            .train(&loaded.dataset, schema)
            .map_err(GatekeeperError::from)
            .and_then(|run| {
                report = Some(run.report);
                self.exporter
                    .export(&run.model, schema)
                    .map(|artifact| {
                        artifact.with_metadata(meta::DATA_SOURCE, loaded.source.label())
                    })
                    .map_err(GatekeeperError::from)
            });

        let write = if options.placeholder_fallback {
            let placeholder = self.exporter.placeholder(schema);
            self.writer
                .write_with_fallback(trained, &placeholder, &options.output_path)?
        } else {
            self.writer.write(&trained?, &options.output_path)?
        };

        let report_path = if options.write_report {
            let summary = RunSummary {
                version_tag: self.version_tag().to_string(),
                artifact_kind: write.kind,
                artifact_bytes: write.bytes,
                data_source: loaded.source.to_string(),
                synthetic_data: loaded.source.is_synthetic(),
                degraded: write.degraded.clone(),
                created_at: Utc::now(),
                training: report.clone(),
            };
            write_summary(&summary, &report_path_for(&options.output_path))
        } else {
            None
        };

        Ok(PipelineOutcome {
            source: loaded.source,
            report,
            write,
            report_path,
        })
    }
}

/// Best-effort; a missing sidecar never fails the run.
fn write_summary(summary: &RunSummary, path: &Path) -> Option<PathBuf> {
    let content = match serde_json::to_string_pretty(summary) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to serialize run summary: {}", e);
            return None;
        }
    };
    match write_atomic(path, content.as_bytes()) {
        Ok(()) => {
            info!("Saved run summary to {:?}", path);
            Some(path.to_path_buf())
        }
        Err(e) => {
            warn!("Failed to write run summary {:?}: {}", path, e);
            None
        }
    }
}

/// Records a trained artifact in the registry. Placeholders and models fitted
/// on synthetic data are never registered, and registry errors are logged
/// and swallowed.
pub async fn record_in_registry(
    registry: &dyn ModelRegistry,
    outcome: &PipelineOutcome,
    version_tag: &str,
) -> Option<RegistrationStatus> {
    let report = match (&outcome.report, outcome.kind()) {
        (Some(report), ArtifactKind::Trained) => report,
        _ => {
            warn!(
                "Not registering {}: artifact is a placeholder",
                version_tag
            );
            return None;
        }
    };
    if outcome.source.is_synthetic() {
        warn!(
            "Not registering {}: trained on synthetic data ({})",
            version_tag, outcome.source
        );
        return None;
    }

    let entry = ModelRegistryEntry::new(
        version_tag,
        &outcome.write.path.display().to_string(),
        &report.summary(),
    );
    match registry.register(&entry).await {
        Ok(status) => {
            match status {
                RegistrationStatus::Inserted => {
                    info!("Registered {} in model registry", version_tag)
                }
                RegistrationStatus::AlreadyExists => {
                    info!("{} already present in model registry, left unchanged", version_tag)
                }
            }
            Some(status)
        }
        Err(e) => {
            warn!("Model registry update failed (ignored): {:#}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DatasetError;
    use crate::infrastructure::persistence::InMemoryModelRegistry;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn test_dir() -> PathBuf {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "gatekeeper_pipeline_{}_{}",
            std::process::id(),
            unique_id
        ))
    }

    fn pipeline() -> GatekeeperPipeline {
        GatekeeperPipeline::new(
            FeatureSchema::gatekeeper_v1(),
            TrainerConfig::default(),
            ExportConfig::default(),
        )
    }

    fn options(dir: &Path, fallback: Option<SyntheticFallback>) -> PipelineOptions {
        PipelineOptions {
            input_path: dir.join("missing.csv"),
            output_path: dir.join("gatekeeper_v1.onnx"),
            synthetic_fallback: fallback,
            placeholder_fallback: true,
            write_report: true,
        }
    }

    #[test]
    fn test_report_path_appends_suffix() {
        assert_eq!(
            report_path_for(Path::new("ml/gatekeeper_v1.onnx")),
            PathBuf::from("ml/gatekeeper_v1.onnx.report.json")
        );
    }

    #[test]
    fn test_missing_data_without_fallback_ends_run() {
        let dir = test_dir();
        let err = pipeline().run(&options(&dir, None)).unwrap_err();
        assert!(matches!(
            err,
            GatekeeperError::Dataset(DatasetError::NotFound { .. })
        ));
        assert!(!dir.join("gatekeeper_v1.onnx").exists());
    }

    #[test]
    fn test_training_failure_degrades_to_placeholder() {
        let dir = test_dir();
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("one_class.csv");
        fs::write(
            &input,
            "50,20,0.01,0.02,0.1,0.1,1,1\n40,30,0.0,0.05,0.2,0.0,0,1\n60,10,0.02,0.01,0.3,0.2,1,1\n",
        )
        .unwrap();
        let mut opts = options(&dir, None);
        opts.input_path = input;

        let outcome = pipeline().run(&opts).unwrap();
        assert_eq!(outcome.kind(), ArtifactKind::Placeholder);
        assert!(outcome.report.is_none());
        assert!(outcome.write.degraded.is_some());

        let summary: RunSummary =
            serde_json::from_str(&fs::read_to_string(outcome.report_path.as_ref().unwrap()).unwrap())
                .unwrap();
        assert_eq!(summary.artifact_kind, ArtifactKind::Placeholder);
        assert!(summary.training.is_none());

        let registry = InMemoryModelRegistry::new();
        let status = tokio_test::block_on(record_in_registry(&registry, &outcome, "gatekeeper_v1"));
        assert!(status.is_none());

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_training_failure_without_placeholder_is_fatal() {
        let dir = test_dir();
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("one_class.csv");
        fs::write(&input, "50,20,0.01,0.02,0.1,0.1,1,0\n40,30,0.0,0.05,0.2,0.0,0,0\n").unwrap();
        let mut opts = options(&dir, None);
        opts.input_path = input;
        opts.placeholder_fallback = false;

        let err = pipeline().run(&opts).unwrap_err();
        assert!(matches!(err, GatekeeperError::Training(_)));
        assert!(!opts.output_path.exists());

        fs::remove_dir_all(dir).ok();
    }

    /// Headerless export where the outcome tracks rsi14, with a few flips.
    fn write_signal_csv(path: &Path, rows: usize) {
        let mut csv = String::new();
        for i in 0..rows {
            let rsi = (i as f64 * 37.0) % 100.0;
            let mut outcome = u8::from(rsi > 50.0);
            if i % 11 == 0 {
                outcome = 1 - outcome;
            }
            csv.push_str(&format!("{:.2},25.0,0.001,0.02,0.1,-0.2,{},{}\n", rsi, i % 2, outcome));
        }
        fs::write(path, csv).unwrap();
    }

    #[test]
    fn test_trained_run_registers_once() {
        let dir = test_dir();
        fs::create_dir_all(&dir).unwrap();
        let mut opts = options(&dir, None);
        opts.input_path = dir.join("data_export.csv");
        write_signal_csv(&opts.input_path, 60);

        let outcome = pipeline().run(&opts).unwrap();
        assert_eq!(outcome.kind(), ArtifactKind::Trained);
        assert!(!outcome.source.is_synthetic());

        let registry = InMemoryModelRegistry::new();
        let first = tokio_test::block_on(record_in_registry(&registry, &outcome, "gatekeeper_v1"));
        let second = tokio_test::block_on(record_in_registry(&registry, &outcome, "gatekeeper_v1"));
        assert_eq!(first, Some(RegistrationStatus::Inserted));
        assert_eq!(second, Some(RegistrationStatus::AlreadyExists));

        let entry = tokio_test::block_on(registry.find_by_version("gatekeeper_v1"))
            .unwrap()
            .unwrap();
        assert!(entry.description.starts_with("LR baseline AUC "));

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_synthetic_run_is_marked_and_not_registered() {
        let dir = test_dir();
        let outcome = pipeline()
            .run(&options(&dir, Some(SyntheticFallback::default())))
            .unwrap();
        assert_eq!(outcome.kind(), ArtifactKind::Trained);
        assert!(outcome.source.is_synthetic());

        let artifact = crate::infrastructure::onnx::ArtifactReader::default()
            .load(&outcome.write.path)
            .unwrap();
        assert_eq!(
            artifact.metadata.get(meta::DATA_SOURCE).map(String::as_str),
            Some("synthetic")
        );

        let registry = InMemoryModelRegistry::new();
        let status = tokio_test::block_on(record_in_registry(&registry, &outcome, "gatekeeper_v1"));
        assert!(status.is_none());
        assert!(tokio_test::block_on(registry.list()).unwrap().is_empty());

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_repeated_runs_leave_no_temp_files() {
        let dir = test_dir();
        fs::create_dir_all(&dir).unwrap();
        let mut opts = options(&dir, None);
        opts.input_path = dir.join("data_export.csv");
        write_signal_csv(&opts.input_path, 40);

        let first = pipeline().run(&opts).unwrap();
        let second = pipeline().run(&opts).unwrap();
        assert_eq!(first.report_path, second.report_path);

        let mut names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "data_export.csv",
                "gatekeeper_v1.onnx",
                "gatekeeper_v1.onnx.report.json"
            ]
        );

        let artifact = crate::infrastructure::onnx::ArtifactReader::default()
            .load(&first.write.path)
            .unwrap();
        assert_eq!(
            artifact.metadata.get(meta::DATA_SOURCE).map(String::as_str),
            Some("file")
        );

        fs::remove_dir_all(dir).ok();
    }
}
