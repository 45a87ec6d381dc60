pub mod artifact;
pub mod contract;
pub mod dataset;
pub mod decision;
pub mod feature_schema;
pub mod graph;
pub mod model;

pub use artifact::{ArtifactKind, ModelArtifact};
pub use dataset::{Dataset, FeatureVector, LabeledExample};
pub use decision::{Decision, DecisionPolicy};
pub use feature_schema::{FeatureDef, FeatureKind, FeatureSchema, SyntheticRange};
pub use graph::DecisionGraph;
pub use model::{FeatureScaler, FittedModel};
