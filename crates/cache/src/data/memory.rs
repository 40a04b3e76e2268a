//! In-memory content store, for tests and one-shot builds.

use async_trait::async_trait;
use goldenhammer_core::cache::{ContentReader, ContentWriter, DataCache};
use goldenhammer_core::error::CacheError;
use goldenhammer_core::hash::HashingWriter;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A content store that keeps every blob in a map for the life of the process.
pub struct MemoryDataCache {
    files: Arc<RwLock<HashMap<String, Arc<[u8]>>>>,
}

impl MemoryDataCache {
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of distinct blobs held.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

impl Default for MemoryDataCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataCache for MemoryDataCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn has_content(&self, hash: &str) -> Result<bool, CacheError> {
        Ok(self.files.read().await.contains_key(hash))
    }

    async fn open(&self, hash: &str) -> Result<ContentReader, CacheError> {
        let data = self
            .files
            .read()
            .await
            .get(hash)
            .cloned()
            .ok_or_else(|| CacheError::ContentNotFound(hash.to_string()))?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn store(&self, writer: ContentWriter<'_>) -> Result<String, CacheError> {
        let mut sink = HashingWriter::new(Vec::new());
        writer(&mut sink).map_err(|e| CacheError::io("<memory>", e))?;
        let (bytes, hash) = sink.finish().map_err(|e| CacheError::io("<memory>", e))?;

        debug!(hash = %hash, size = bytes.len(), "Stored content in memory");
        self.files.write().await.insert(hash.clone(), bytes.into());
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldenhammer_core::hash::sha256_hex;
    use std::io::Write;

    const VALUES: [&str; 6] = ["hello world", "a", "ab", "abc", "d", "e"];

    #[tokio::test]
    async fn written_values_can_be_read() {
        let cache = MemoryDataCache::new();
        for value in VALUES {
            let hash = cache.store_bytes(value.as_bytes()).await.unwrap();
            assert_eq!(hash, sha256_hex(value));
            assert_eq!(cache.read(&hash).await.unwrap(), value.as_bytes());
        }
        assert_eq!(cache.len().await, VALUES.len());
    }

    #[tokio::test]
    async fn streaming_writer_is_hashed_as_a_whole() {
        let cache = MemoryDataCache::new();
        let hash = cache
            .store(&|sink: &mut dyn Write| {
                sink.write_all(b"hello ")?;
                sink.write_all(b"world")
            })
            .await
            .unwrap();
        assert_eq!(hash, sha256_hex("hello world"));
    }

    #[tokio::test]
    async fn identical_bytes_store_once() {
        let cache = MemoryDataCache::new();
        let first = cache.store_bytes(b"same").await.unwrap();
        let second = cache.store_bytes(b"same").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.read(&first).await.unwrap(), b"same");
    }

    #[tokio::test]
    async fn has_content_only_for_stored_hashes() {
        let cache = MemoryDataCache::new();
        let hash = cache.store_bytes(b"present").await.unwrap();
        assert!(cache.has_content(&hash).await.unwrap());
        assert!(!cache.has_content(&sha256_hex("absent")).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_hash_fails_with_its_name() {
        let cache = MemoryDataCache::new();
        let err = cache.open("unknown").await.err().unwrap();
        assert!(matches!(err, CacheError::ContentNotFound(ref h) if h == "unknown"));
    }

    #[tokio::test]
    async fn failing_writer_stores_nothing() {
        let cache = MemoryDataCache::new();
        let result = cache
            .store(&|_sink: &mut dyn Write| Err(std::io::Error::other("boom")))
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty().await);
    }
}
