//! Conversion between [`ModelArtifact`] and the ONNX `ModelProto` wire form.

use super::proto::{
    ATTRIBUTE_INT, AttributeProto, DATA_TYPE_FLOAT, GraphProto, ModelProto,
    NodeProto, OperatorSetIdProto, StringStringEntryProto, TensorProto, TensorShapeProto,
    TypeProto, ValueInfoProto, tensor_shape_proto, type_proto,
};
use crate::domain::errors::{ArtifactError, GraphError};
use crate::domain::ml::contract::{OPSET_DOMAIN, meta};
use crate::domain::ml::graph::{Dim, GraphNode, Initializer, Op, TensorSpec};
use crate::domain::ml::{ArtifactKind, DecisionGraph, ModelArtifact};
use prost::Message;
use std::collections::BTreeMap;

const MODEL_DOC: &str = "Gatekeeper approve/reject classifier over pre-trade features";
const MODEL_VERSION: i64 = 1;

/// Default Softmax axis for opset >= 13 when the attribute is absent.
const SOFTMAX_DEFAULT_AXIS: i64 = -1;

pub fn encode(artifact: &ModelArtifact) -> Vec<u8> {
    to_proto(artifact).encode_to_vec()
}

pub fn decode(bytes: &[u8]) -> Result<ModelArtifact, ArtifactError> {
    let proto = ModelProto::decode(bytes).map_err(|e| ArtifactError::Decode(e.to_string()))?;
    from_proto(proto)
}

pub fn to_proto(artifact: &ModelArtifact) -> ModelProto {
    let graph = &artifact.graph;
    ModelProto {
        ir_version: artifact.ir_version,
        producer_name: artifact.producer_name().to_string(),
        producer_version: artifact.producer_version.clone(),
        domain: String::new(),
        model_version: MODEL_VERSION,
        doc_string: MODEL_DOC.to_string(),
        graph: Some(GraphProto {
            node: graph.nodes.iter().map(node_to_proto).collect(),
            name: graph.name.clone(),
            initializer: graph.initializers.iter().map(tensor_to_proto).collect(),
            doc_string: String::new(),
            input: graph.inputs.iter().map(value_info_to_proto).collect(),
            output: graph.outputs.iter().map(value_info_to_proto).collect(),
            value_info: Vec::new(),
        }),
        opset_import: vec![OperatorSetIdProto {
            domain: OPSET_DOMAIN.to_string(),
            version: artifact.opset_version,
        }],
        metadata_props: artifact
            .metadata
            .iter()
            .map(|(key, value)| StringStringEntryProto {
                key: key.clone(),
                value: value.clone(),
            })
            .collect(),
    }
}

fn node_to_proto(node: &GraphNode) -> NodeProto {
    let attribute = match node.op {
        Op::Softmax { axis } => vec![AttributeProto {
            name: "axis".to_string(),
            i: axis,
            r#type: ATTRIBUTE_INT,
            ..Default::default()
        }],
        _ => Vec::new(),
    };
    NodeProto {
        input: node.inputs.clone(),
        output: node.outputs.clone(),
        name: node.name.clone(),
        op_type: node.op.op_type().to_string(),
        attribute,
        doc_string: String::new(),
        domain: OPSET_DOMAIN.to_string(),
    }
}

fn tensor_to_proto(init: &Initializer) -> TensorProto {
    TensorProto {
        dims: init.dims.iter().map(|&d| d as i64).collect(),
        data_type: DATA_TYPE_FLOAT,
        float_data: init.values.clone(),
        name: init.name.clone(),
        raw_data: Vec::new(),
    }
}

fn value_info_to_proto(spec: &TensorSpec) -> ValueInfoProto {
    let dim = spec
        .dims
        .iter()
        .map(|d| tensor_shape_proto::Dimension {
            value: Some(match d {
                Dim::Fixed(n) => tensor_shape_proto::dimension::Value::DimValue(*n as i64),
                Dim::Symbolic(s) => tensor_shape_proto::dimension::Value::DimParam(s.clone()),
            }),
        })
        .collect();
    ValueInfoProto {
        name: spec.name.clone(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: DATA_TYPE_FLOAT,
                shape: Some(TensorShapeProto { dim }),
            })),
        }),
        doc_string: String::new(),
    }
}

/// Rebuilds the artifact. Structural validation is left to the caller.
pub fn from_proto(proto: ModelProto) -> Result<ModelArtifact, ArtifactError> {
    let opset_version = proto
        .opset_import
        .iter()
        .find(|o| is_default_domain(&o.domain))
        .map(|o| o.version)
        .ok_or(ArtifactError::Missing("default-domain opset import"))?;

    let metadata: BTreeMap<String, String> = proto
        .metadata_props
        .into_iter()
        .map(|e| (e.key, e.value))
        .collect();

    let kind = match metadata.get(meta::ARTIFACT_KIND) {
        Some(raw) => raw.parse::<ArtifactKind>().map_err(ArtifactError::Decode)?,
        None => [ArtifactKind::Trained, ArtifactKind::Placeholder]
            .into_iter()
            .find(|k| k.producer_name() == proto.producer_name)
            .ok_or(ArtifactError::Missing("artifact_kind"))?,
    };

    let graph_proto = proto.graph.ok_or(ArtifactError::Missing("graph"))?;
    let graph = DecisionGraph {
        name: graph_proto.name,
        inputs: graph_proto
            .input
            .iter()
            .map(value_info_from_proto)
            .collect::<Result<_, _>>()?,
        outputs: graph_proto
            .output
            .iter()
            .map(value_info_from_proto)
            .collect::<Result<_, _>>()?,
        initializers: graph_proto
            .initializer
            .into_iter()
            .map(tensor_from_proto)
            .collect::<Result<_, _>>()?,
        nodes: graph_proto
            .node
            .into_iter()
            .map(node_from_proto)
            .collect::<Result<_, _>>()?,
    };

    let version_tag = metadata
        .get(meta::VERSION_TAG)
        .cloned()
        .unwrap_or_else(|| graph.name.clone());

    Ok(ModelArtifact {
        graph,
        kind,
        version_tag,
        producer_version: proto.producer_version,
        opset_version,
        ir_version: proto.ir_version,
        metadata,
    })
}

fn is_default_domain(domain: &str) -> bool {
    domain.is_empty() || domain == "ai.onnx"
}

fn node_from_proto(node: NodeProto) -> Result<GraphNode, ArtifactError> {
    if !is_default_domain(&node.domain) {
        return Err(GraphError::UnsupportedOp(format!("{}::{}", node.domain, node.op_type)).into());
    }
    let op = match node.op_type.as_str() {
        "MatMul" => Op::MatMul,
        "Add" => Op::Add,
        "Identity" => Op::Identity,
        "Softmax" => {
            let axis = node
                .attribute
                .iter()
                .find(|a| a.name == "axis")
                .map(|a| a.i)
                .unwrap_or(SOFTMAX_DEFAULT_AXIS);
            Op::Softmax { axis }
        }
        other => return Err(GraphError::UnsupportedOp(other.to_string()).into()),
    };
    Ok(GraphNode {
        name: node.name,
        op,
        inputs: node.input,
        outputs: node.output,
    })
}

fn tensor_from_proto(tensor: TensorProto) -> Result<Initializer, ArtifactError> {
    if tensor.data_type != DATA_TYPE_FLOAT {
        return Err(ArtifactError::Decode(format!(
            "initializer '{}' has data type {}, only FLOAT is supported",
            tensor.name, tensor.data_type
        )));
    }
    let dims = tensor
        .dims
        .iter()
        .map(|&d| usize::try_from(d))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| {
            ArtifactError::Decode(format!(
                "initializer '{}' has negative dims {:?}",
                tensor.name, tensor.dims
            ))
        })?;

    let values = if !tensor.raw_data.is_empty() {
        if tensor.raw_data.len() % 4 != 0 {
            return Err(ArtifactError::Decode(format!(
                "initializer '{}' raw data is {} bytes, not a multiple of 4",
                tensor.name,
                tensor.raw_data.len()
            )));
        }
        tensor
            .raw_data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    } else {
        tensor.float_data
    };

    let expected: usize = dims.iter().product();
    if values.len() != expected {
        return Err(GraphError::InitializerSize {
            name: tensor.name,
            dims,
            found: values.len(),
        }
        .into());
    }
    Ok(Initializer {
        name: tensor.name,
        dims,
        values,
    })
}

fn value_info_from_proto(info: &ValueInfoProto) -> Result<TensorSpec, ArtifactError> {
    let tensor = match info.r#type.as_ref().and_then(|t| t.value.as_ref()) {
        Some(type_proto::Value::TensorType(t)) => t,
        None => {
            return Err(ArtifactError::Decode(format!(
                "value '{}' has no tensor type",
                info.name
            )));
        }
    };
    if tensor.elem_type != DATA_TYPE_FLOAT {
        return Err(ArtifactError::Decode(format!(
            "value '{}' has element type {}, expected FLOAT",
            info.name, tensor.elem_type
        )));
    }

    let dims = tensor
        .shape
        .as_ref()
        .map(|s| s.dim.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|d| match &d.value {
            Some(tensor_shape_proto::dimension::Value::DimValue(v)) => usize::try_from(*v)
                .map(Dim::Fixed)
                .map_err(|_| ArtifactError::Decode(format!("value '{}' has dim {}", info.name, v))),
            Some(tensor_shape_proto::dimension::Value::DimParam(p)) => Ok(Dim::Symbolic(p.clone())),
            None => Ok(Dim::Symbolic(String::new())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TensorSpec {
        name: info.name.clone(),
        dims,
    })
}
