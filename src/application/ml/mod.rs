pub mod exporter;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod scorer;
pub mod solver;
pub mod trainer;

pub use exporter::{ExportConfig, GraphExporter};
pub use loader::{DataSource, FeatureFrameLoader, LoadedDataset, SyntheticFallback};
pub use metrics::{AucScore, ConfusionMatrix};
pub use pipeline::{GatekeeperPipeline, PipelineOptions, PipelineOutcome, RunSummary};
pub use scorer::{ApproveScorer, GraphScorer};
pub use trainer::{ClassWeighting, Trainer, TrainerConfig, TrainingReport, TrainingRun};
