//! Scoring through ONNX Runtime. Compiled only with the `onnxruntime`
//! feature, which links the native runtime via `ort`.

use crate::application::ml::scorer::ApproveScorer;
use crate::domain::ml::contract::{APPROVE_INDEX, OUTPUT_NAME};
use anyhow::{Context, Result};
use ort::session::Session;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub struct OnnxRuntimeScorer {
    session: Mutex<Session>,
    version: String,
}

impl OnnxRuntimeScorer {
    pub fn load(model_path: &Path, version: &str) -> Result<Self> {
        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model {:?}", model_path))?;
        info!("Loaded ONNX model from {:?}", model_path);

        Ok(Self {
            session: Mutex::new(session),
            version: version.to_string(),
        })
    }
}

impl ApproveScorer for OnnxRuntimeScorer {
    fn approve_probability(&self, features: &[f64]) -> Result<f64> {
        let row: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let shape = vec![1, row.len()];
        let input_value = ort::value::Value::from_array((shape.as_slice(), row))
            .context("Input value creation failed")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock failed: {}", e))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .context("ONNX Runtime inference failed")?;

        let output_value = outputs
            .iter()
            .find(|(name, _)| *name == OUTPUT_NAME)
            .map(|(_, v)| v)
            .ok_or_else(|| anyhow::anyhow!("No '{}' output found", OUTPUT_NAME))?;
        let data = output_value
            .try_extract_tensor::<f32>()
            .context("Output is not a float tensor")?;
        let p = data
            .1
            .get(APPROVE_INDEX)
            .ok_or_else(|| anyhow::anyhow!("Output row is narrower than 2"))?;
        Ok(f64::from(*p))
    }

    fn name(&self) -> &str {
        "ONNX Runtime"
    }

    fn version(&self) -> &str {
        &self.version
    }
}
