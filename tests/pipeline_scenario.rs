use gatekeeper::application::ml::exporter::ExportConfig;
use gatekeeper::application::ml::loader::SyntheticFallback;
use gatekeeper::application::ml::metrics::AucScore;
use gatekeeper::application::ml::pipeline::{GatekeeperPipeline, PipelineOptions, RunSummary};
use gatekeeper::application::ml::trainer::TrainerConfig;
use gatekeeper::domain::ml::{ArtifactKind, FeatureSchema};
use gatekeeper::infrastructure::onnx::ArtifactReader;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_dir(label: &str) -> PathBuf {
    let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "gatekeeper_it_{}_{}_{}",
        label,
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

fn options(dir: &Path, input: PathBuf) -> PipelineOptions {
    PipelineOptions {
        input_path: input,
        output_path: dir.join("ml").join("gatekeeper_v1.onnx"),
        synthetic_fallback: Some(SyntheticFallback::default()),
        placeholder_fallback: true,
        write_report: true,
    }
}

#[test]
fn test_missing_dataset_trains_on_synthetic_rows() {
    let dir = test_dir("synthetic");
    let opts = options(&dir, dir.join("ml").join("data_export.csv"));

    let outcome = pipeline().run(&opts).expect("pipeline should complete");

    assert!(outcome.source.is_synthetic());
    assert_eq!(outcome.kind(), ArtifactKind::Trained);
    assert!(outcome.write.degraded.is_none());

    let report = outcome.report.as_ref().unwrap();
    assert_eq!(report.train_rows + report.test_rows, 100);
    assert_eq!(report.test_rows, 20);

    // Artifact exists and passes the structural self-check on load.
    assert!(opts.output_path.exists());
    let artifact = ArtifactReader::default().load(&opts.output_path).unwrap();
    assert!(artifact.graph.validate().is_ok());
    assert!(artifact.graph.check_contract(7).is_ok());
    assert_eq!(artifact.kind, ArtifactKind::Trained);
    assert_eq!(artifact.producer_name(), "gatekeeper-trainer");

    let summary: RunSummary = serde_json::from_str(
        &fs::read_to_string(outcome.report_path.as_ref().unwrap()).unwrap(),
    )
    .unwrap();
    assert!(summary.synthetic_data);
    assert_eq!(summary.artifact_bytes, outcome.write.bytes);

    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_identical_runs_produce_identical_artifacts() {
    let dir_a = test_dir("det_a");
    let dir_b = test_dir("det_b");
    let a = options(&dir_a, dir_a.join("missing.csv"));
    let b = options(&dir_b, dir_b.join("missing.csv"));

    pipeline().run(&a).unwrap();
    pipeline().run(&b).unwrap();

    assert_eq!(
        fs::read(&a.output_path).unwrap(),
        fs::read(&b.output_path).unwrap()
    );

    fs::remove_dir_all(dir_a).ok();
    fs::remove_dir_all(dir_b).ok();
}

#[test]
fn test_csv_export_with_signal_reports_defined_auc() {
    let dir = test_dir("csv");
    fs::create_dir_all(&dir).unwrap();
    let input = dir.join("data_export.csv");

    // Outcome follows rsi14, with a few label flips to keep it non-separable.
    let mut csv = String::new();
    for i in 0..120 {
        let rsi = (i as f64 * 37.0) % 100.0;
        let adx = (i as f64 * 13.0) % 100.0;
        let action = i % 2;
        let mut outcome = u8::from(rsi > 50.0);
        if i % 11 == 0 {
            outcome = 1 - outcome;
        }
        csv.push_str(&format!(
            "{:.2},{:.2},0.001,0.02,0.1,-0.2,{},{}\n",
            rsi, adx, action, outcome
        ));
    }
    fs::write(&input, csv).unwrap();

    let outcome = pipeline().run(&options(&dir, input)).unwrap();
    assert!(!outcome.source.is_synthetic());

    let report = outcome.report.unwrap();
    assert_eq!(report.train_rows, 96);
    assert_eq!(report.test_rows, 24);
    let auc = match &report.auc {
        AucScore::Defined { value } => *value,
        AucScore::Undefined { reason } => panic!("AUC undefined: {reason}"),
    };
    assert!(auc > 0.7, "AUC {auc}");
    assert_eq!(report.summary(), format!("LR baseline AUC {:.2}", auc));
    assert_eq!(report.coefficients.len(), 7);

    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_malformed_export_is_not_replaced_by_synthetic_data() {
    let dir = test_dir("malformed");
    fs::create_dir_all(&dir).unwrap();
    let input = dir.join("data_export.csv");
    fs::write(&input, "55.0,20.0,0.01\n").unwrap();

    let opts = options(&dir, input);
    assert!(pipeline().run(&opts).is_err());
    assert!(!opts.output_path.exists());

    fs::remove_dir_all(dir).ok();
}
