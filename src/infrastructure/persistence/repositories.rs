//! Model registry implementations: SQLite for deployments, in-memory for
//! tests and dry runs.

use crate::domain::repositories::{ModelRegistry, ModelRegistryEntry, RegistrationStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub struct SqliteModelRegistry {
    pool: SqlitePool,
}

impl SqliteModelRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ModelRegistryEntry> {
        let created_at: i64 = row.try_get("created_at")?;
        Ok(ModelRegistryEntry {
            version: row.try_get("version")?,
            path: row.try_get("path")?,
            description: row.try_get("description")?,
            created_at: timestamp_to_utc(created_at),
        })
    }
}

fn timestamp_to_utc(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

#[async_trait]
impl ModelRegistry for SqliteModelRegistry {
    async fn register(&self, entry: &ModelRegistryEntry) -> Result<RegistrationStatus> {
        let result = sqlx::query(
            r#"
            INSERT INTO rl_models (version, path, description, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(version) DO NOTHING
            "#,
        )
        .bind(&entry.version)
        .bind(&entry.path)
        .bind(&entry.description)
        .bind(entry.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to register model version")?;

        if result.rows_affected() == 0 {
            info!("Model version {} already registered", entry.version);
            Ok(RegistrationStatus::AlreadyExists)
        } else {
            info!("Registered model version {} -> {}", entry.version, entry.path);
            Ok(RegistrationStatus::Inserted)
        }
    }

    async fn find_by_version(&self, version: &str) -> Result<Option<ModelRegistryEntry>> {
        let row = sqlx::query("SELECT * FROM rl_models WHERE version = ?")
            .bind(version)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query model version")?;

        row.as_ref().map(Self::entry_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<ModelRegistryEntry>> {
        let rows = sqlx::query("SELECT * FROM rl_models ORDER BY created_at ASC, version ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list model versions")?;

        rows.iter().map(Self::entry_from_row).collect()
    }
}

/// In-memory implementation of ModelRegistry
pub struct InMemoryModelRegistry {
    entries: Arc<RwLock<Vec<ModelRegistryEntry>>>,
}

impl InMemoryModelRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelRegistry for InMemoryModelRegistry {
    async fn register(&self, entry: &ModelRegistryEntry) -> Result<RegistrationStatus> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.version == entry.version) {
            return Ok(RegistrationStatus::AlreadyExists);
        }
        entries.push(entry.clone());
        Ok(RegistrationStatus::Inserted)
    }

    async fn find_by_version(&self, version: &str) -> Result<Option<ModelRegistryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|e| e.version == version).cloned())
    }

    async fn list(&self) -> Result<Vec<ModelRegistryEntry>> {
        Ok(self.entries.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;

    #[tokio::test]
    async fn test_in_memory_registry_keeps_first_record() {
        let registry = InMemoryModelRegistry::new();
        let first = ModelRegistryEntry::new("gatekeeper_v1", "ml/a.onnx", "LR baseline AUC 0.61");
        let second = ModelRegistryEntry::new("gatekeeper_v1", "ml/b.onnx", "LR baseline AUC 0.99");

        assert_eq!(
            registry.register(&first).await.unwrap(),
            RegistrationStatus::Inserted
        );
        assert_eq!(
            registry.register(&second).await.unwrap(),
            RegistrationStatus::AlreadyExists
        );

        let stored = registry.find_by_version("gatekeeper_v1").await.unwrap().unwrap();
        assert_eq!(stored.path, "ml/a.onnx");
        assert_eq!(registry.list().await.unwrap().len(), 1);
        assert!(registry.find_by_version("gatekeeper_v2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_registry_insert_and_lookup() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let registry = SqliteModelRegistry::new(db.pool.clone());

        let entry = ModelRegistryEntry::new(
            "gatekeeper_v1",
            "ml/gatekeeper_v1.onnx",
            "LR baseline AUC undefined",
        );
        assert_eq!(
            registry.register(&entry).await.unwrap(),
            RegistrationStatus::Inserted
        );
        assert_eq!(
            registry.register(&entry).await.unwrap(),
            RegistrationStatus::AlreadyExists
        );

        let stored = registry.find_by_version("gatekeeper_v1").await.unwrap().unwrap();
        assert_eq!(stored.description, "LR baseline AUC undefined");
        assert_eq!(
            stored.created_at.timestamp_millis(),
            entry.created_at.timestamp_millis()
        );

        registry
            .register(&ModelRegistryEntry::new("gatekeeper_v2", "ml/v2.onnx", "LR baseline AUC 0.70"))
            .await
            .unwrap();
        let versions: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.version)
            .collect();
        assert_eq!(versions.len(), 2);
        assert!(versions.contains(&"gatekeeper_v2".to_string()));
    }
}
