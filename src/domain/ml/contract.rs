//! Interface contract between the exported artifact and the inference runtime.
//!
//! These values are compared byte-for-byte by the consumer. Changing any of
//! them is a breaking change for deployed runtimes.

/// Default-domain operator set the runtime build was compiled against.
pub const OPSET_VERSION: i64 = 22;

/// ONNX IR version understood by the runtime.
pub const IR_VERSION: i64 = 10;

/// Default (ai.onnx) operator domain.
pub const OPSET_DOMAIN: &str = "";

pub const INPUT_NAME: &str = "float_input";
pub const OUTPUT_NAME: &str = "output";
pub const WEIGHTS_NAME: &str = "gatekeeper_weights";
pub const BIAS_NAME: &str = "gatekeeper_bias";

/// Symbolic leading dimension of input and output.
pub const BATCH_DIM: &str = "batch";

/// Width of the output tensor: `[reject, approve]`.
pub const OUTPUT_WIDTH: usize = 2;
pub const REJECT_INDEX: usize = 0;
pub const APPROVE_INDEX: usize = 1;
pub const CLASS_ORDER: &str = "reject,approve";

pub const DEFAULT_VERSION_TAG: &str = "gatekeeper_v1";

pub const TRAINED_PRODUCER: &str = "gatekeeper-trainer";
pub const PLACEHOLDER_PRODUCER: &str = "gatekeeper-placeholder";

/// Metadata keys stamped into the artifact.
pub mod meta {
    pub const VERSION_TAG: &str = "version_tag";
    pub const ARTIFACT_KIND: &str = "artifact_kind";
    pub const FEATURE_NAMES: &str = "feature_names";
    pub const SCHEMA_VERSION: &str = "schema_version";
    pub const CLASS_ORDER: &str = "class_order";
    /// `file` or `synthetic`; absent on placeholders.
    pub const DATA_SOURCE: &str = "data_source";
}
