//! Exclusion list persistence.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::StoreError;

pub mod memory;
pub mod postgres;

/// One row of the exclusion list.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExcludedIp {
    pub ip: String,
    pub created_at: DateTime<Utc>,
}

/// Durable set of excluded addresses.
///
/// Implementations must enforce uniqueness of `ip` atomically in the backing
/// storage, so two concurrent inserts of the same address cannot both succeed.
/// Callers pass canonical address strings (see [`crate::ip::canonicalize`]).
#[async_trait]
pub trait ExclusionStore: Send + Sync {
    async fn insert(&self, ip: &str) -> Result<(), StoreError>;

    async fn list(&self) -> Result<HashSet<String>, StoreError>;

    /// All rows, oldest first.
    async fn entries(&self) -> Result<Vec<ExcludedIp>, StoreError>;

    async fn delete(&self, ip: &str) -> Result<(), StoreError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;
}
