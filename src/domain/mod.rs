// Gatekeeper model domain: schema, dataset, model, graph, artifact, policy
pub mod ml;

// Repository traits
pub mod repositories;

// Domain-specific error types
pub mod errors;
