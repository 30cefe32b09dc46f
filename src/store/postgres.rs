use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{ExcludedIp, ExclusionStore};
use crate::config::DatabaseConfig;
use crate::errors::StoreError;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(cfg.connect_options()?)
            .await
            .context("failed to connect to PostgreSQL")?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ExclusionStore for PgStore {
    async fn insert(&self, ip: &str) -> Result<(), StoreError> {
        // the UNIQUE constraint on `ip` arbitrates concurrent inserts
        sqlx::query("INSERT INTO excluded_ips (ip) VALUES ($1)")
            .bind(ip)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    StoreError::DuplicateEntry(ip.to_string())
                }
                other => StoreError::StorageUnavailable(other),
            })?;
        Ok(())
    }

    async fn list(&self) -> Result<HashSet<String>, StoreError> {
        let rows = sqlx::query_scalar::<_, String>("SELECT ip FROM excluded_ips")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::StorageUnavailable)?;
        Ok(rows.into_iter().collect())
    }

    async fn entries(&self) -> Result<Vec<ExcludedIp>, StoreError> {
        sqlx::query_as::<_, ExcludedIp>(
            "SELECT ip, created_at FROM excluded_ips ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::StorageUnavailable)
    }

    async fn delete(&self, ip: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM excluded_ips WHERE ip = $1")
            .bind(ip)
            .execute(&self.pool)
            .await
            .map_err(StoreError::StorageUnavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(ip.to_string()));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::StorageUnavailable)?;
        Ok(())
    }
}
