//! In-memory build cache, kept for the life of the process.

use async_trait::async_trait;
use goldenhammer_core::cache::{BuildCache, CacheRecord};
use goldenhammer_core::error::CacheError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub struct InMemoryBuildCache {
    records: Arc<RwLock<HashMap<String, CacheRecord>>>,
}

impl InMemoryBuildCache {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of keys with a stored record.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryBuildCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildCache for InMemoryBuildCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, key: &str) -> Result<CacheRecord, CacheError> {
        Ok(self
            .records
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or(CacheRecord::NotCached))
    }

    async fn store(&self, key: &str, record: &CacheRecord) -> Result<(), CacheError> {
        debug!(key = %key, cached = record.is_cached(), "Stored build record in memory");
        self.records
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }
}
