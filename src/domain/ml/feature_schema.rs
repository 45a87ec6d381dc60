use crate::domain::errors::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Semantic family of an indicator column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Oscillator,
    TrendStrength,
    MovingAverageDelta,
    VolatilityBand,
    Sentiment,
    OrderBook,
    Action,
}

/// Value range used when synthesizing rows for this column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyntheticRange {
    Uniform { low: f64, high: f64 },
    Binary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    pub kind: FeatureKind,
    pub synthetic: SyntheticRange,
}

impl FeatureDef {
    pub fn uniform(name: &str, kind: FeatureKind, low: f64, high: f64) -> Self {
        Self {
            name: name.to_string(),
            kind,
            synthetic: SyntheticRange::Uniform { low, high },
        }
    }

    pub fn binary(name: &str, kind: FeatureKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            synthetic: SyntheticRange::Binary,
        }
    }
}

/// Versioned column layout of a Gatekeeper dataset.
///
/// The order of `features` is the positional contract of the exported input
/// tensor. Reordering, adding or removing a feature is a breaking change and
/// requires a new `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: String,
    pub features: Vec<FeatureDef>,
    pub label: String,
    #[serde(default)]
    pub has_headers: bool,
}

impl FeatureSchema {
    /// Column layout written by the trade export job: seven indicator columns
    /// followed by the `outcome` label, no header row.
    pub fn gatekeeper_v1() -> Self {
        use FeatureKind::*;
        Self {
            version: "gatekeeper_v1".to_string(),
            features: vec![
                FeatureDef::uniform("rsi14", Oscillator, 0.0, 100.0),
                FeatureDef::uniform("adx14", TrendStrength, 0.0, 100.0),
                FeatureDef::uniform("fastMASlowDelta", MovingAverageDelta, -0.05, 0.05),
                FeatureDef::uniform("bbWidth", VolatilityBand, 0.0, 0.1),
                FeatureDef::uniform("avgSent", Sentiment, -1.0, 1.0),
                FeatureDef::uniform("avgOB", OrderBook, -1.0, 1.0),
                FeatureDef::binary("action", Action),
            ],
            label: "outcome".to_string(),
            has_headers: false,
        }
    }

    /// Parse a schema from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self, SchemaError> {
        let schema: FeatureSchema =
            toml::from_str(content).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.version.trim().is_empty() {
            return Err(SchemaError::Invalid("schema version is empty".to_string()));
        }
        if self.features.is_empty() {
            return Err(SchemaError::Invalid("schema declares no features".to_string()));
        }

        let mut seen = HashSet::new();
        for def in &self.features {
            if !seen.insert(def.name.as_str()) {
                return Err(SchemaError::Invalid(format!(
                    "duplicate feature name '{}'",
                    def.name
                )));
            }
            if let SyntheticRange::Uniform { low, high } = def.synthetic
                && !(low.is_finite() && high.is_finite() && low < high)
            {
                return Err(SchemaError::Invalid(format!(
                    "feature '{}' has invalid synthetic range [{}, {})",
                    def.name, low, high
                )));
            }
        }
        if seen.contains(self.label.as_str()) {
            return Err(SchemaError::Invalid(format!(
                "label '{}' is also declared as a feature",
                self.label
            )));
        }
        Ok(())
    }

    /// Number of features (F).
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Number of CSV columns, features plus the trailing label.
    pub fn column_count(&self) -> usize {
        self.features.len() + 1
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::gatekeeper_v1()
    }
}
