//! Model registry configuration parsing from environment variables.

use super::EnvSource;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/gatekeeper.db";

/// Registry environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEnvConfig {
    pub enabled: bool,
    pub database_url: String,
}

impl Default for RegistryEnvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl RegistryEnvConfig {
    pub(crate) fn from_source(source: &EnvSource) -> Self {
        Self {
            enabled: source.parse_bool("GATEKEEPER_REGISTRY_ENABLED", true),
            database_url: source
                .get("GATEKEEPER_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_config_defaults() {
        let config = RegistryEnvConfig::from_source(&EnvSource::empty());
        assert!(config.enabled);
        assert_eq!(config.database_url, "sqlite://data/gatekeeper.db");
    }

    #[test]
    fn test_registry_can_be_disabled() {
        let source = EnvSource::from_pairs(&[
            ("GATEKEEPER_REGISTRY_ENABLED", "false"),
            ("GATEKEEPER_DATABASE_URL", "sqlite::memory:"),
        ]);
        let config = RegistryEnvConfig::from_source(&source);
        assert!(!config.enabled);
        assert_eq!(config.database_url, "sqlite::memory:");
    }
}
