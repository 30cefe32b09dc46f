use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{ExcludedIp, ExclusionStore};
use crate::errors::StoreError;

/// In-process exclusion list for development (`serve --in-memory`) and tests.
/// Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, ExcludedIp>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExclusionStore for MemoryStore {
    async fn insert(&self, ip: &str) -> Result<(), StoreError> {
        // entry() holds the shard lock, so check-and-insert is atomic
        match self.entries.entry(ip.to_string()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateEntry(ip.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(ExcludedIp {
                    ip: ip.to_string(),
                    created_at: Utc::now(),
                });
                Ok(())
            }
        }
    }

    async fn list(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }

    async fn entries(&self) -> Result<Vec<ExcludedIp>, StoreError> {
        let mut rows: Vec<ExcludedIp> = self.entries.iter().map(|e| e.value().clone()).collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.ip.cmp(&b.ip)));
        Ok(rows)
    }

    async fn delete(&self, ip: &str) -> Result<(), StoreError> {
        self.entries
            .remove(ip)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(ip.to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_second_insert_is_duplicate() {
        let store = MemoryStore::new();
        store.insert("10.0.0.5").await.unwrap();

        let err = store.insert("10.0.0.5").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEntry(ref ip) if ip == "10.0.0.5"));
        assert_eq!(store.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_leaves_store_unchanged() {
        let store = MemoryStore::new();
        store.insert("192.0.2.1").await.unwrap();

        let err = store.delete("192.0.2.2").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(
            store.list().await.unwrap(),
            HashSet::from(["192.0.2.1".to_string()])
        );
    }

    #[tokio::test]
    async fn test_delete_then_reinsert() {
        let store = MemoryStore::new();
        store.insert("2001:db8::1").await.unwrap();
        store.delete("2001:db8::1").await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        store.insert("2001:db8::1").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_inserts_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert("203.0.113.9").await })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
