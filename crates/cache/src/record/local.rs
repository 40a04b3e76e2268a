//! On-disk build cache.
//!
//! Each record is a small JSON document at `<base>/<key[0]>/<key>`, written
//! through `<base>/temp/<uuid>` and renamed into place. A record that cannot
//! be read back is treated as absent so a damaged cache only costs a rebuild.

use async_trait::async_trait;
use goldenhammer_core::cache::{BuildCache, CacheRecord};
use goldenhammer_core::error::CacheError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::atomic;

pub struct LocalBuildCache {
    base: PathBuf,
}

impl LocalBuildCache {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        debug!(path = %base.display(), "Local build cache opened");
        Self { base }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base
    }

    fn record_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        atomic::sharded_path(&self.base, key)
            .ok_or_else(|| CacheError::Serialization(format!("cache key is not a hex digest: {key}")))
    }
}

#[async_trait]
impl BuildCache for LocalBuildCache {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch(&self, key: &str) -> Result<CacheRecord, CacheError> {
        let path = self.record_path(key)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CacheRecord::NotCached);
            }
            Err(e) => return Err(CacheError::io(path, e)),
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring unreadable build record");
                Ok(CacheRecord::NotCached)
            }
        }
    }

    async fn store(&self, key: &str, record: &CacheRecord) -> Result<(), CacheError> {
        let dest = self.record_path(key)?;
        let json = serde_json::to_vec(record).map_err(|e| CacheError::Serialization(e.to_string()))?;

        let temp = atomic::temp_file(&self.base.join("temp")).await?;
        if let Err(e) = tokio::fs::write(&temp, &json).await {
            atomic::discard(&temp).await;
            return Err(CacheError::io(temp, e));
        }
        atomic::publish(&temp, &dest).await?;

        debug!(key = %key, cached = record.is_cached(), "Stored build record on disk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldenhammer_core::hash::sha256_hex;

    #[tokio::test]
    async fn records_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let key = sha256_hex("key");
        let record = CacheRecord::found(vec![b"proxy".to_vec(), b"other".to_vec()]);

        LocalBuildCache::new(dir.path())
            .store(&key, &record)
            .await
            .unwrap();

        let reopened = LocalBuildCache::new(dir.path());
        assert_eq!(reopened.fetch(&key).await.unwrap(), record);
        assert!(dir.path().join(&key[..1]).join(&key).exists());
    }

    #[tokio::test]
    async fn missing_record_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalBuildCache::new(dir.path());
        assert_eq!(
            cache.fetch(&sha256_hex("nothing")).await.unwrap(),
            CacheRecord::NotCached
        );
    }

    #[tokio::test]
    async fn corrupt_record_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let key = sha256_hex("corrupt");
        let path = dir.path().join(&key[..1]).join(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();

        let cache = LocalBuildCache::new(dir.path());
        assert_eq!(cache.fetch(&key).await.unwrap(), CacheRecord::NotCached);
    }

    #[tokio::test]
    async fn incomplete_record_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalBuildCache::new(dir.path());
        let key = sha256_hex("key");

        cache
            .store(&key, &CacheRecord::incomplete(vec!["inc.h".into()]))
            .await
            .unwrap();
        cache
            .store(&key, &CacheRecord::found(Vec::new()))
            .await
            .unwrap();
        assert_eq!(cache.fetch(&key).await.unwrap(), CacheRecord::found(Vec::new()));
    }

    #[tokio::test]
    async fn non_hex_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalBuildCache::new(dir.path());
        assert!(cache.fetch("../escape").await.is_err());
    }
}
