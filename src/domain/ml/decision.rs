use crate::domain::errors::PolicyError;
use crate::domain::ml::contract::APPROVE_INDEX;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => write!(f, "approve"),
            Decision::Reject => write!(f, "reject"),
        }
    }
}

/// Operating point applied to the graph's approve probability.
///
/// The threshold is not part of the exported graph, so it can be moved
/// without retraining.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    threshold: f64,
}

impl DecisionPolicy {
    pub const DEFAULT_THRESHOLD: f64 = 0.5;

    pub fn new(threshold: f64) -> Result<Self, PolicyError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(PolicyError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// `Approve` iff `p >= threshold`. A NaN probability never approves.
    pub fn decide(&self, approve_probability: f64) -> Decision {
        if approve_probability >= self.threshold {
            Decision::Approve
        } else {
            Decision::Reject
        }
    }

    /// Decide from one `[reject, approve]` output row of the decision graph.
    pub fn decide_output(&self, row: &[f32]) -> Decision {
        match row.get(APPROVE_INDEX) {
            Some(p) => self.decide(f64::from(*p)),
            None => Decision::Reject,
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}
