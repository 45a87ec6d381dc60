use thiserror::Error;

/// Errors related to feature schema definitions
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid feature schema: {0}")]
    Invalid(String),

    #[error("Failed to parse feature schema: {0}")]
    Parse(String),

    #[error("Failed to read feature schema {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Errors raised while reading a labeled dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset not found at {path}")]
    NotFound { path: String },

    #[error("Failed to read dataset {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}, column '{column}': cannot parse '{value}' as a number")]
    InvalidNumber {
        line: u64,
        column: String,
        value: String,
    },

    #[error("Line {line}: label '{value}' is not binary")]
    InvalidLabel { line: u64, value: String },

    #[error("Dataset is empty")]
    Empty,

    #[error("Feature vector has {found} values, schema expects {expected}")]
    FeatureCount { expected: usize, found: usize },
}

/// Errors raised while fitting the logistic model
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Need at least {required} labeled rows, got {available}")]
    NotEnoughRows { required: usize, available: usize },

    #[error("Invalid test fraction {0}: must be in (0, 1)")]
    InvalidTestFraction(f64),

    #[error("Training partition contains a single class ({label}); cannot fit a decision boundary")]
    SingleClass { label: u8 },

    #[error("Linear system is singular at iteration {iteration}")]
    Singular { iteration: usize },

    #[error("Solver diverged: objective became non-finite at iteration {iteration}")]
    Diverged { iteration: usize },
}

/// Structural violations of a decision graph
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Graph must declare exactly one {role} tensor, found {found}")]
    InterfaceArity { role: &'static str, found: usize },

    #[error("Node '{node}' reads '{tensor}' which is not produced before it")]
    UnresolvedInput { node: String, tensor: String },

    #[error("Tensor '{0}' is produced more than once")]
    DuplicateTensor(String),

    #[error("Declared output '{0}' is never produced")]
    MissingOutput(String),

    #[error("Unsupported operator '{0}'")]
    UnsupportedOp(String),

    #[error("Node '{node}' expects {expected} inputs, got {found}")]
    NodeArity {
        node: String,
        expected: usize,
        found: usize,
    },

    #[error("Initializer '{name}' has {found} values for shape {dims:?}")]
    InitializerSize {
        name: String,
        dims: Vec<usize>,
        found: usize,
    },

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Contract violation: {0}")]
    Contract(String),
}

/// Errors raised while turning fitted parameters into a graph
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Parameter {name} is not finite ({value})")]
    NonFiniteParameter { name: String, value: f64 },

    #[error("Model has {model} coefficients but schema declares {schema} features")]
    FeatureCount { model: usize, schema: usize },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors related to the serialized model artifact
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to decode artifact: {0}")]
    Decode(String),

    #[error("Artifact {field} is {found}, runtime expects {expected}")]
    VersionMismatch {
        field: &'static str,
        expected: i64,
        found: i64,
    },

    #[error("Artifact is missing {0}")]
    Missing(&'static str),

    #[error("I/O failure on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors related to decision thresholds
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("Threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
}

/// Umbrella error for the training-to-artifact pipeline
#[derive(Debug, Error)]
pub enum GatekeeperError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}
