//! Translates a fitted logistic model into the Gatekeeper decision graph.
//!
//! Layout: `float_input (batch, F) x gatekeeper_weights (F, 2)` then
//! `+ gatekeeper_bias (2)` then `Softmax(axis = 1)` into `output (batch, 2)`.
//! Column 0 (reject) is all zeros and column 1 (approve) carries the linear
//! score, so `softmax([0, s])[1] == sigmoid(s)`.

use crate::domain::errors::ExportError;
use crate::domain::ml::contract::{
    BATCH_DIM, BIAS_NAME, DEFAULT_VERSION_TAG, INPUT_NAME, IR_VERSION, OPSET_VERSION, OUTPUT_NAME,
    OUTPUT_WIDTH, WEIGHTS_NAME, meta,
};
use crate::domain::ml::graph::{DecisionGraph, GraphNode, Initializer, Op, TensorSpec};
use crate::domain::ml::{ArtifactKind, FeatureSchema, FittedModel, ModelArtifact};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub version_tag: String,
    pub opset_version: i64,
    pub ir_version: i64,
    pub producer_version: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            version_tag: DEFAULT_VERSION_TAG.to_string(),
            opset_version: OPSET_VERSION,
            ir_version: IR_VERSION,
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub struct GraphExporter {
    config: ExportConfig,
}

impl GraphExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Builds and self-checks the artifact for a trained model.
    pub fn export(
        &self,
        model: &FittedModel,
        schema: &FeatureSchema,
    ) -> Result<ModelArtifact, ExportError> {
        if model.feature_count() != schema.feature_count() {
            return Err(ExportError::FeatureCount {
                model: model.feature_count(),
                schema: schema.feature_count(),
            });
        }

        let (coefficients, intercept) = model.raw_parameters();
        for (def, &w) in schema.features.iter().zip(&coefficients) {
            check_finite(&def.name, w)?;
        }
        check_finite("intercept", intercept)?;

        let approve: Vec<f32> = coefficients.iter().map(|&w| w as f32).collect();
        let graph = decision_graph(&self.config.version_tag, &approve, intercept as f32);
        graph.check_contract(schema.feature_count())?;

        debug!(
            "Decision graph: {} nodes, weights {:?}, bias {:?}",
            graph.nodes.len(),
            [schema.feature_count(), OUTPUT_WIDTH],
            [OUTPUT_WIDTH]
        );
        info!(
            "Exported {} (opset {}, IR {}) with {} features",
            self.config.version_tag,
            self.config.opset_version,
            self.config.ir_version,
            schema.feature_count()
        );

        Ok(self.stamp(graph, ArtifactKind::Trained, schema))
    }

    /// Stand-in with the same interface whose output is always `[0.5, 0.5]`.
    pub fn placeholder(&self, schema: &FeatureSchema) -> ModelArtifact {
        let approve = vec![0.0f32; schema.feature_count()];
        let graph = decision_graph(&self.config.version_tag, &approve, 0.0);
        self.stamp(graph, ArtifactKind::Placeholder, schema)
    }

    fn stamp(
        &self,
        graph: DecisionGraph,
        kind: ArtifactKind,
        schema: &FeatureSchema,
    ) -> ModelArtifact {
        let mut artifact = ModelArtifact::new(graph, kind, &self.config.version_tag)
            .with_metadata(meta::FEATURE_NAMES, schema.feature_names().join(","))
            .with_metadata(meta::SCHEMA_VERSION, schema.version.clone());
        artifact.opset_version = self.config.opset_version;
        artifact.ir_version = self.config.ir_version;
        artifact.producer_version = self.config.producer_version.clone();
        artifact
    }
}

fn check_finite(name: &str, value: f64) -> Result<(), ExportError> {
    if value.is_finite() && (value as f32).is_finite() {
        Ok(())
    } else {
        Err(ExportError::NonFiniteParameter {
            name: name.to_string(),
            value,
        })
    }
}

/// Linear transform, bias add and 2-way softmax over `approve.len()` features.
fn decision_graph(name: &str, approve: &[f32], approve_bias: f32) -> DecisionGraph {
    let width = approve.len();
    let weights: Vec<f32> = approve.iter().flat_map(|&w| [0.0, w]).collect();

    DecisionGraph {
        name: name.to_string(),
        inputs: vec![TensorSpec::batched(INPUT_NAME, BATCH_DIM, width)],
        outputs: vec![TensorSpec::batched(OUTPUT_NAME, BATCH_DIM, OUTPUT_WIDTH)],
        initializers: vec![
            Initializer {
                name: WEIGHTS_NAME.to_string(),
                dims: vec![width, OUTPUT_WIDTH],
                values: weights,
            },
            Initializer {
                name: BIAS_NAME.to_string(),
                dims: vec![OUTPUT_WIDTH],
                values: vec![0.0, approve_bias],
            },
        ],
        nodes: vec![
            GraphNode::new("linear", Op::MatMul, &[INPUT_NAME, WEIGHTS_NAME], "linear_out"),
            GraphNode::new("bias_add", Op::Add, &["linear_out", BIAS_NAME], "logits"),
            GraphNode::new("softmax", Op::Softmax { axis: 1 }, &["logits"], OUTPUT_NAME),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::FeatureScaler;
    use crate::domain::ml::contract::APPROVE_INDEX;

    fn schema() -> FeatureSchema {
        FeatureSchema::gatekeeper_v1()
    }

    fn sample_rows() -> Vec<Vec<f64>> {
        vec![
            vec![55.0, 20.0, 0.01, 0.03, 0.2, -0.1, 1.0],
            vec![12.0, 80.0, -0.04, 0.09, -0.9, 0.7, 0.0],
            vec![99.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            vec![0.0; 7],
        ]
    }

    #[test]
    fn test_zero_model_outputs_one_half() {
        let model = FittedModel::new(vec![0.0; 7], 0.0);
        let artifact = GraphExporter::new(ExportConfig::default())
            .export(&model, &schema())
            .unwrap();

        for row in sample_rows() {
            let out = artifact.graph.evaluate_row(&row).unwrap();
            assert!((out[0] - 0.5).abs() < 1e-6);
            assert!((out[1] - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_graph_reproduces_model_probability() {
        let model = FittedModel::new(vec![0.02, -0.01, 12.0, -7.5, 0.4, 0.9, -0.3], -0.6);
        let artifact = GraphExporter::new(ExportConfig::default())
            .export(&model, &schema())
            .unwrap();

        for row in sample_rows() {
            let out = artifact.graph.evaluate_row(&row).unwrap();
            assert!(((out[0] + out[1]) - 1.0).abs() < 1e-6);
            assert!((f64::from(out[APPROVE_INDEX]) - model.predict_proba(&row)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_scaler_is_folded_into_weights() {
        let rows = sample_rows();
        let scaler = FeatureScaler::fit(&rows, 7);
        let model =
            FittedModel::new(vec![0.5, -0.2, 0.3, 0.1, 0.8, -0.4, 0.2], 0.1).with_scaler(scaler);
        let artifact = GraphExporter::new(ExportConfig::default())
            .export(&model, &schema())
            .unwrap();

        for row in rows {
            let out = artifact.graph.evaluate_row(&row).unwrap();
            assert!((f64::from(out[APPROVE_INDEX]) - model.predict_proba(&row)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_contract_fields_are_stamped() {
        let model = FittedModel::new(vec![0.1; 7], 0.0);
        let artifact = GraphExporter::new(ExportConfig::default())
            .export(&model, &schema())
            .unwrap();

        assert_eq!(artifact.opset_version, 22);
        assert_eq!(artifact.ir_version, 10);
        assert_eq!(artifact.kind, ArtifactKind::Trained);
        assert_eq!(artifact.version_tag, "gatekeeper_v1");
        assert_eq!(artifact.feature_count(), Some(7));
        assert_eq!(artifact.feature_names()[1], "adx14");
        assert!(artifact.graph.check_contract(7).is_ok());
    }

    #[test]
    fn test_non_finite_parameter_fails_export() {
        let mut coefficients = vec![0.1; 7];
        coefficients[3] = f64::NAN;
        let err = GraphExporter::new(ExportConfig::default())
            .export(&FittedModel::new(coefficients, 0.0), &schema())
            .unwrap_err();
        match err {
            ExportError::NonFiniteParameter { name, .. } => assert_eq!(name, "bbWidth"),
            other => panic!("unexpected error: {other}"),
        }

        let err = GraphExporter::new(ExportConfig::default())
            .export(&FittedModel::new(vec![0.1; 7], 1e300), &schema())
            .unwrap_err();
        assert!(matches!(err, ExportError::NonFiniteParameter { .. }));
    }

    #[test]
    fn test_feature_count_mismatch() {
        let err = GraphExporter::new(ExportConfig::default())
            .export(&FittedModel::new(vec![0.1; 4], 0.0), &schema())
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::FeatureCount {
                model: 4,
                schema: 7
            }
        ));
    }

    #[test]
    fn test_placeholder_is_marked_and_neutral() {
        let artifact = GraphExporter::new(ExportConfig::default()).placeholder(&schema());
        assert!(artifact.is_placeholder());
        assert_eq!(artifact.producer_name(), "gatekeeper-placeholder");
        assert!(artifact.graph.check_contract(7).is_ok());
        let out = artifact.graph.evaluate_row(&sample_rows()[0]).unwrap();
        assert!((out[1] - 0.5).abs() < 1e-6);
    }
}
