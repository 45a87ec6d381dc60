//! Repository Pattern Abstractions
//!
//! The model registry records which artifact backs a version tag. It is a
//! bookkeeping side-channel: the training pipeline treats every registry
//! failure as non-fatal.
//!
//! # Example
//!
//! ```rust,no_run
//! use gatekeeper::domain::repositories::{ModelRegistry, ModelRegistryEntry};
//! use gatekeeper::infrastructure::persistence::InMemoryModelRegistry;
//!
//! # async {
//! let registry = InMemoryModelRegistry::new();
//! let entry = ModelRegistryEntry::new("gatekeeper_v1", "ml/gatekeeper_v1.onnx", "LR baseline AUC 0.71");
//! // registry.register(&entry).await?;
//! # };
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRegistryEntry {
    pub version: String,
    pub path: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl ModelRegistryEntry {
    pub fn new(version: &str, path: &str, description: &str) -> Self {
        Self {
            version: version.to_string(),
            path: path.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Inserted,
    /// A record for this version already exists and was left untouched.
    AlreadyExists,
}

/// Repository of trained model versions
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Insert a record unless its version is already registered
    async fn register(&self, entry: &ModelRegistryEntry) -> Result<RegistrationStatus>;

    /// Look up a record by version tag
    async fn find_by_version(&self, version: &str) -> Result<Option<ModelRegistryEntry>>;

    /// All records, oldest first
    async fn list(&self) -> Result<Vec<ModelRegistryEntry>>;
}
