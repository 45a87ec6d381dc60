//! Declarative computation graph of the Gatekeeper decision function.
//!
//! The graph is a topologically ordered chain of nodes over named tensors.
//! Node order is execution order: a node may only read the graph input,
//! an initializer, or a tensor produced by an earlier node, which rules out
//! cycles by construction once [`DecisionGraph::validate`] passes.

use crate::domain::errors::GraphError;
use crate::domain::ml::contract::{BIAS_NAME, INPUT_NAME, OUTPUT_NAME, OUTPUT_WIDTH, WEIGHTS_NAME};
use ndarray::{Array2, ArrayD, Axis, Ix2, IxDyn};
use std::collections::{HashMap, HashSet};

/// One dimension of a declared tensor shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    Fixed(usize),
    Symbolic(String),
}

/// Declared graph input or output. Element type is always 32-bit float.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSpec {
    pub name: String,
    pub dims: Vec<Dim>,
}

impl TensorSpec {
    pub fn batched(name: &str, batch: &str, width: usize) -> Self {
        Self {
            name: name.to_string(),
            dims: vec![Dim::Symbolic(batch.to_string()), Dim::Fixed(width)],
        }
    }

    /// `Some(width)` when the shape is `(symbolic, width)`.
    pub fn batched_width(&self) -> Option<usize> {
        match self.dims.as_slice() {
            [Dim::Symbolic(_), Dim::Fixed(w)] => Some(*w),
            _ => None,
        }
    }
}

/// Constant tensor embedded in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Initializer {
    pub name: String,
    pub dims: Vec<usize>,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    MatMul,
    Add,
    Softmax { axis: i64 },
    Identity,
}

impl Op {
    pub fn op_type(&self) -> &'static str {
        match self {
            Op::MatMul => "MatMul",
            Op::Add => "Add",
            Op::Softmax { .. } => "Softmax",
            Op::Identity => "Identity",
        }
    }

    fn arity(&self) -> usize {
        match self {
            Op::MatMul | Op::Add => 2,
            Op::Softmax { .. } | Op::Identity => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub name: String,
    pub op: Op,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl GraphNode {
    pub fn new(name: &str, op: Op, inputs: &[&str], output: &str) -> Self {
        Self {
            name: name.to_string(),
            op,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: vec![output.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionGraph {
    pub name: String,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    pub initializers: Vec<Initializer>,
    pub nodes: Vec<GraphNode>,
}

impl DecisionGraph {
    pub fn input(&self) -> Option<&TensorSpec> {
        self.inputs.first()
    }

    pub fn output(&self) -> Option<&TensorSpec> {
        self.outputs.first()
    }

    pub fn initializer(&self, name: &str) -> Option<&Initializer> {
        self.initializers.iter().find(|i| i.name == name)
    }

    /// Structural self-check: single input, single output, every node input
    /// resolved by something earlier, every tensor produced once.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.inputs.len() != 1 {
            return Err(GraphError::InterfaceArity {
                role: "input",
                found: self.inputs.len(),
            });
        }
        if self.outputs.len() != 1 {
            return Err(GraphError::InterfaceArity {
                role: "output",
                found: self.outputs.len(),
            });
        }

        let mut available: HashSet<&str> = HashSet::new();
        available.insert(self.inputs[0].name.as_str());

        for init in &self.initializers {
            let expected: usize = init.dims.iter().product();
            if expected != init.values.len() {
                return Err(GraphError::InitializerSize {
                    name: init.name.clone(),
                    dims: init.dims.clone(),
                    found: init.values.len(),
                });
            }
            if !available.insert(init.name.as_str()) {
                return Err(GraphError::DuplicateTensor(init.name.clone()));
            }
        }

        for node in &self.nodes {
            if node.inputs.len() != node.op.arity() || node.outputs.len() != 1 {
                return Err(GraphError::NodeArity {
                    node: node.name.clone(),
                    expected: node.op.arity(),
                    found: node.inputs.len(),
                });
            }
            for input in &node.inputs {
                if !available.contains(input.as_str()) {
                    return Err(GraphError::UnresolvedInput {
                        node: node.name.clone(),
                        tensor: input.clone(),
                    });
                }
            }
            for output in &node.outputs {
                if !available.insert(output.as_str()) {
                    return Err(GraphError::DuplicateTensor(output.clone()));
                }
            }
        }

        let output = &self.outputs[0].name;
        let produced = self
            .nodes
            .iter()
            .any(|n| n.outputs.iter().any(|o| o == output));
        if !produced {
            return Err(GraphError::MissingOutput(output.clone()));
        }
        Ok(())
    }

    /// Checks the runtime-facing names and shapes for a model over
    /// `feature_count` features.
    pub fn check_contract(&self, feature_count: usize) -> Result<(), GraphError> {
        self.validate()?;

        let input = &self.inputs[0];
        if input.name != INPUT_NAME {
            return Err(GraphError::Contract(format!(
                "input is named '{}', expected '{}'",
                input.name, INPUT_NAME
            )));
        }
        if input.batched_width() != Some(feature_count) {
            return Err(GraphError::Contract(format!(
                "input shape {:?} is not (batch, {})",
                input.dims, feature_count
            )));
        }

        let output = &self.outputs[0];
        if output.name != OUTPUT_NAME {
            return Err(GraphError::Contract(format!(
                "output is named '{}', expected '{}'",
                output.name, OUTPUT_NAME
            )));
        }
        if output.batched_width() != Some(OUTPUT_WIDTH) {
            return Err(GraphError::Contract(format!(
                "output shape {:?} is not (batch, {})",
                output.dims, OUTPUT_WIDTH
            )));
        }

        match self.initializer(WEIGHTS_NAME) {
            Some(w) if w.dims == [feature_count, OUTPUT_WIDTH] => {}
            Some(w) => {
                return Err(GraphError::Contract(format!(
                    "weights have shape {:?}, expected [{}, {}]",
                    w.dims, feature_count, OUTPUT_WIDTH
                )));
            }
            None => return Err(GraphError::Contract("weights initializer missing".into())),
        }
        match self.initializer(BIAS_NAME) {
            Some(b) if b.dims == [OUTPUT_WIDTH] => Ok(()),
            Some(b) => Err(GraphError::Contract(format!(
                "bias has shape {:?}, expected [{}]",
                b.dims, OUTPUT_WIDTH
            ))),
            None => Err(GraphError::Contract("bias initializer missing".into())),
        }
    }

    /// Reference interpreter. `batch` is `(rows, F)`; returns the declared
    /// output tensor, `(rows, 2)` for a Gatekeeper graph.
    pub fn evaluate(&self, batch: &Array2<f32>) -> Result<Array2<f32>, GraphError> {
        self.validate()?;

        let input = &self.inputs[0];
        if let Some(width) = input.batched_width()
            && batch.ncols() != width
        {
            return Err(GraphError::Shape(format!(
                "input has {} columns, graph expects {}",
                batch.ncols(),
                width
            )));
        }

        let mut values: HashMap<&str, ArrayD<f32>> = HashMap::new();
        values.insert(input.name.as_str(), batch.clone().into_dyn());
        for init in &self.initializers {
            let array = ArrayD::from_shape_vec(IxDyn(&init.dims), init.values.clone())
                .map_err(|e| GraphError::Shape(format!("{}: {}", init.name, e)))?;
            values.insert(init.name.as_str(), array);
        }

        for node in &self.nodes {
            let arg = |i: usize| -> Result<&ArrayD<f32>, GraphError> {
                values
                    .get(node.inputs[i].as_str())
                    .ok_or_else(|| GraphError::UnresolvedInput {
                        node: node.name.clone(),
                        tensor: node.inputs[i].clone(),
                    })
            };
            let result = match &node.op {
                Op::MatMul => matmul(&node.name, arg(0)?, arg(1)?)?,
                Op::Add => add(&node.name, arg(0)?, arg(1)?)?,
                Op::Softmax { axis } => softmax(&node.name, arg(0)?, *axis)?,
                Op::Identity => arg(0)?.clone(),
            };
            values.insert(node.outputs[0].as_str(), result);
        }

        let output = &self.outputs[0].name;
        values
            .remove(output.as_str())
            .ok_or_else(|| GraphError::MissingOutput(output.clone()))?
            .into_dimensionality::<Ix2>()
            .map_err(|e| GraphError::Shape(format!("output '{}': {}", output, e)))
    }

    /// Evaluates a single feature vector and returns its output row.
    pub fn evaluate_row(&self, features: &[f64]) -> Result<Vec<f32>, GraphError> {
        let row: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let batch = Array2::from_shape_vec((1, row.len()), row)
            .map_err(|e| GraphError::Shape(e.to_string()))?;
        Ok(self.evaluate(&batch)?.row(0).to_vec())
    }
}

fn matmul(node: &str, a: &ArrayD<f32>, b: &ArrayD<f32>) -> Result<ArrayD<f32>, GraphError> {
    let shape_err = |e: ndarray::ShapeError| GraphError::Shape(format!("{}: {}", node, e));
    let a = a.view().into_dimensionality::<Ix2>().map_err(shape_err)?;
    let b = b.view().into_dimensionality::<Ix2>().map_err(shape_err)?;
    if a.ncols() != b.nrows() {
        return Err(GraphError::Shape(format!(
            "{}: cannot multiply {:?} by {:?}",
            node,
            a.shape(),
            b.shape()
        )));
    }
    Ok(a.dot(&b).into_dyn())
}

fn add(node: &str, a: &ArrayD<f32>, b: &ArrayD<f32>) -> Result<ArrayD<f32>, GraphError> {
    if let Some(rhs) = b.broadcast(a.raw_dim()) {
        return Ok(a + &rhs);
    }
    if let Some(lhs) = a.broadcast(b.raw_dim()) {
        return Ok(&lhs + b);
    }
    Err(GraphError::Shape(format!(
        "{}: cannot broadcast {:?} with {:?}",
        node,
        a.shape(),
        b.shape()
    )))
}

fn softmax(node: &str, x: &ArrayD<f32>, axis: i64) -> Result<ArrayD<f32>, GraphError> {
    let ndim = x.ndim() as i64;
    let axis = if axis < 0 { ndim + axis } else { axis };
    if axis < 0 || axis >= ndim {
        return Err(GraphError::Shape(format!(
            "{}: softmax axis {} out of range for rank {}",
            node, axis, ndim
        )));
    }

    let mut out = x.clone();
    for mut lane in out.lanes_mut(Axis(axis as usize)) {
        let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        lane.mapv_inplace(|v| (v - max).exp());
        let sum = lane.sum();
        lane.mapv_inplace(|v| v / sum);
    }
    Ok(out)
}
