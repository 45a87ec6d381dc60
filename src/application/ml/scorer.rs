use crate::domain::ml::contract::{APPROVE_INDEX, OUTPUT_WIDTH};
use crate::domain::ml::{Decision, DecisionPolicy, ModelArtifact};
use anyhow::{Context, Result};

/// Anything that can turn one feature vector into an approve probability.
pub trait ApproveScorer: Send + Sync {
    /// Probability of the approve class, in `[0, 1]`.
    fn approve_probability(&self, features: &[f64]) -> Result<f64>;

    /// Get scorer name/type
    fn name(&self) -> &str;

    /// Get model version tag
    fn version(&self) -> &str;

    fn decide(&self, features: &[f64], policy: &DecisionPolicy) -> Result<(f64, Decision)> {
        let p = self.approve_probability(features)?;
        Ok((p, policy.decide(p)))
    }
}

/// Scores with the in-process reference evaluator of the artifact's graph.
pub struct GraphScorer {
    artifact: ModelArtifact,
}

impl GraphScorer {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }
}

impl ApproveScorer for GraphScorer {
    fn approve_probability(&self, features: &[f64]) -> Result<f64> {
        let row = self
            .artifact
            .graph
            .evaluate_row(features)
            .context("Decision graph evaluation failed")?;
        if row.len() != OUTPUT_WIDTH {
            anyhow::bail!("Expected {} outputs, got {}", OUTPUT_WIDTH, row.len());
        }
        Ok(f64::from(row[APPROVE_INDEX]))
    }

    fn name(&self) -> &str {
        if self.artifact.is_placeholder() {
            "Decision graph (placeholder)"
        } else {
            "Decision graph"
        }
    }

    fn version(&self) -> &str {
        &self.artifact.version_tag
    }
}
