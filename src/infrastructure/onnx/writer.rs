use super::codec;
use crate::domain::errors::{ArtifactError, GatekeeperError};
use crate::domain::ml::{ArtifactKind, ModelArtifact};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of persisting an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub bytes: usize,
    pub kind: ArtifactKind,
    /// Why the trained artifact was replaced by the placeholder, if it was.
    pub degraded: Option<String>,
}

impl WriteOutcome {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Serializes artifacts and replaces the target file atomically.
///
/// Bytes are decoded again and compared with the source artifact before
/// anything touches the disk, so a file on disk always passed the self-check.
/// The target is only ever replaced by `rename`, so readers see either the
/// previous file or the complete new one.
#[derive(Debug, Default, Clone)]
pub struct ArtifactWriter;

impl ArtifactWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, artifact: &ModelArtifact, path: &Path) -> Result<WriteOutcome, ArtifactError> {
        artifact.graph.validate()?;

        let bytes = codec::encode(artifact);
        let reloaded = codec::decode(&bytes)?;
        reloaded.graph.validate()?;
        if &reloaded != artifact {
            return Err(ArtifactError::Decode(
                "serialized artifact does not decode to the same graph".to_string(),
            ));
        }

        write_atomic(path, &bytes)?;
        info!(
            "Wrote {} artifact {} ({} bytes) to {:?}",
            artifact.kind,
            artifact.version_tag,
            bytes.len(),
            path
        );

        Ok(WriteOutcome {
            path: path.to_path_buf(),
            bytes: bytes.len(),
            kind: artifact.kind,
            degraded: None,
        })
    }

    /// Writes `trained`, or `placeholder` when training/export failed or the
    /// trained artifact could not be written. Only a failure to write the
    /// placeholder itself is returned as an error.
    pub fn write_with_fallback(
        &self,
        trained: Result<ModelArtifact, GatekeeperError>,
        placeholder: &ModelArtifact,
        path: &Path,
    ) -> Result<WriteOutcome, ArtifactError> {
        let reason = match trained {
            Ok(artifact) => match self.write(&artifact, path) {
                Ok(outcome) => return Ok(outcome),
                Err(e) => format!("failed to write trained artifact: {}", e),
            },
            Err(e) => e.to_string(),
        };

        error!("{}. Writing placeholder artifact instead.", reason);
        let mut outcome = self.write(placeholder, path)?;
        warn!(
            "{:?} is a PLACEHOLDER (producer {}); its approve probability is always 0.5",
            outcome.path,
            placeholder.producer_name()
        );
        outcome.degraded = Some(reason);
        Ok(outcome)
    }
}

fn io_error(path: &Path, e: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Writes to a unique hidden sibling, syncs, then renames onto `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let file_name = path
        .file_name()
        .ok_or(ArtifactError::Missing("output file name"))?
        .to_string_lossy();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| io_error(&parent, e))?;

    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));
    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        fs::remove_file(&temp_path).ok();
        return Err(io_error(path, e));
    }
    Ok(())
}
