use super::codec;
use crate::domain::errors::ArtifactError;
use crate::domain::ml::ModelArtifact;
use crate::domain::ml::contract::{IR_VERSION, OPSET_VERSION};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Loads artifacts the way the inference runtime does: version fields must
/// match exactly and the graph must satisfy the interface contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactReader {
    pub expected_opset: i64,
    pub expected_ir: i64,
}

impl Default for ArtifactReader {
    fn default() -> Self {
        Self {
            expected_opset: OPSET_VERSION,
            expected_ir: IR_VERSION,
        }
    }
}

impl ArtifactReader {
    pub fn load(&self, path: &Path) -> Result<ModelArtifact, ArtifactError> {
        let bytes = fs::read(path).map_err(|e| ArtifactError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let artifact = self.load_bytes(&bytes)?;
        debug!(
            "Loaded {} artifact {} from {:?}",
            artifact.kind, artifact.version_tag, path
        );
        Ok(artifact)
    }

    pub fn load_bytes(&self, bytes: &[u8]) -> Result<ModelArtifact, ArtifactError> {
        let artifact = codec::decode(bytes)?;

        if artifact.ir_version != self.expected_ir {
            return Err(ArtifactError::VersionMismatch {
                field: "ir_version",
                expected: self.expected_ir,
                found: artifact.ir_version,
            });
        }
        if artifact.opset_version != self.expected_opset {
            return Err(ArtifactError::VersionMismatch {
                field: "opset",
                expected: self.expected_opset,
                found: artifact.opset_version,
            });
        }

        let width = artifact
            .feature_count()
            .ok_or(ArtifactError::Missing("(batch, F) input shape"))?;
        artifact.graph.check_contract(width)?;

        let names = artifact.feature_names();
        if !names.is_empty() && names.len() != width {
            return Err(ArtifactError::Decode(format!(
                "metadata lists {} feature names for a {}-wide input",
                names.len(),
                width
            )));
        }

        if artifact.is_placeholder() {
            warn!(
                "Artifact {} is a placeholder and always outputs [0.5, 0.5]",
                artifact.version_tag
            );
        }
        Ok(artifact)
    }
}
