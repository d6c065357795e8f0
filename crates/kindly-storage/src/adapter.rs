// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite storage as a [`PluginAdapter`] for health checks and shutdown.

use async_trait::async_trait;
use tracing::debug;

use kindly_config::model::StorageConfig;
use kindly_core::{AdapterType, HealthStatus, KindlyError, PluginAdapter};

use crate::database::{Database, map_tr_err};

/// SQLite-backed storage adapter wrapping a [`Database`] handle.
pub struct SqliteStorage {
    config: StorageConfig,
    db: Database,
}

impl SqliteStorage {
    /// Open the configured database file.
    pub async fn open(config: StorageConfig) -> Result<Self, KindlyError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite storage initialized");
        Ok(Self { config, db })
    }

    /// Shared database handle for the pipeline components.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn path(&self) -> &str {
        &self.config.database_path
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, KindlyError> {
        let ok = self
            .db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA quick_check", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err)?;
        if ok == "ok" {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(format!("quick_check: {ok}")))
        }
    }

    async fn shutdown(&self) -> Result<(), KindlyError> {
        if self.config.wal_mode {
            self.db.checkpoint().await?;
        }
        Ok(())
    }
}
