//! ONNX serialization of Gatekeeper decision graphs.

pub mod codec;
pub mod proto;
pub mod reader;
#[cfg(feature = "onnxruntime")]
pub mod runtime;
pub mod writer;

pub use reader::ArtifactReader;
#[cfg(feature = "onnxruntime")]
pub use runtime::OnnxRuntimeScorer;
pub use writer::{ArtifactWriter, WriteOutcome};
