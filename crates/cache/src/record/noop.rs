//! Disabled build cache. Every fetch misses, every store is dropped.

use async_trait::async_trait;
use goldenhammer_core::cache::{BuildCache, CacheRecord};
use goldenhammer_core::error::CacheError;

/// A build cache that remembers nothing, forcing every source to rebuild.
pub struct NullBuildCache;

#[async_trait]
impl BuildCache for NullBuildCache {
    fn name(&self) -> &str {
        "none"
    }

    async fn fetch(&self, _key: &str) -> Result<CacheRecord, CacheError> {
        Ok(CacheRecord::NotCached)
    }

    async fn store(&self, _key: &str, _record: &CacheRecord) -> Result<(), CacheError> {
        Ok(())
    }
}
