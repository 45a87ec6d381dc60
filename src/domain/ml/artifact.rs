use crate::domain::ml::contract::{
    CLASS_ORDER, IR_VERSION, OPSET_VERSION, PLACEHOLDER_PRODUCER, TRAINED_PRODUCER, meta,
};
use crate::domain::ml::graph::DecisionGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Distinguishes a fitted decision function from a development stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Trained,
    Placeholder,
}

impl ArtifactKind {
    pub fn producer_name(&self) -> &'static str {
        match self {
            ArtifactKind::Trained => TRAINED_PRODUCER,
            ArtifactKind::Placeholder => PLACEHOLDER_PRODUCER,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Trained => write!(f, "trained"),
            ArtifactKind::Placeholder => write!(f, "placeholder"),
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trained" => Ok(ArtifactKind::Trained),
            "placeholder" => Ok(ArtifactKind::Placeholder),
            other => Err(format!("unknown artifact kind '{}'", other)),
        }
    }
}

/// A decision graph plus the compatibility fields the runtime checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub graph: DecisionGraph,
    pub kind: ArtifactKind,
    pub version_tag: String,
    pub producer_version: String,
    pub opset_version: i64,
    pub ir_version: i64,
    pub metadata: BTreeMap<String, String>,
}

impl ModelArtifact {
    pub fn new(graph: DecisionGraph, kind: ArtifactKind, version_tag: &str) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(meta::VERSION_TAG.to_string(), version_tag.to_string());
        metadata.insert(meta::ARTIFACT_KIND.to_string(), kind.to_string());
        metadata.insert(meta::CLASS_ORDER.to_string(), CLASS_ORDER.to_string());

        Self {
            graph,
            kind,
            version_tag: version_tag.to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            opset_version: OPSET_VERSION,
            ir_version: IR_VERSION,
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn producer_name(&self) -> &'static str {
        self.kind.producer_name()
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == ArtifactKind::Placeholder
    }

    /// Feature names recorded at export time, in input order.
    pub fn feature_names(&self) -> Vec<String> {
        self.metadata
            .get(meta::FEATURE_NAMES)
            .map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn feature_count(&self) -> Option<usize> {
        self.graph.input().and_then(|i| i.batched_width())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_text() {
        for kind in [ArtifactKind::Trained, ArtifactKind::Placeholder] {
            assert_eq!(kind.to_string().parse::<ArtifactKind>(), Ok(kind));
        }
        assert!("pickle".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn test_producers_differ() {
        assert_ne!(
            ArtifactKind::Trained.producer_name(),
            ArtifactKind::Placeholder.producer_name()
        );
    }
}
