//! On-disk content store.
//!
//! Layout under the base directory:
//!
//! ```text
//! <base>/data/<hash[0]>/<hash>   stored content
//! <base>/temp/<uuid>             in-flight writes
//! ```
//!
//! Writes stream into a temp file while being hashed; once the digest is
//! known the file is renamed to its final name. Readers therefore never see a
//! partially written blob, and concurrent stores of identical bytes are safe.

use async_trait::async_trait;
use goldenhammer_core::cache::{ContentReader, ContentWriter, DataCache};
use goldenhammer_core::error::CacheError;
use goldenhammer_core::hash::HashingWriter;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

use crate::atomic;

/// A content store rooted at a directory on disk.
pub struct LocalDataCache {
    base: PathBuf,
}

impl LocalDataCache {
    /// Create a store rooted at `base`. Directories are created on first write.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        debug!(path = %base.display(), "Local data cache opened");
        Self { base }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base
    }

    pub fn data_directory(&self) -> PathBuf {
        self.base.join("data")
    }

    pub fn temp_directory(&self) -> PathBuf {
        self.base.join("temp")
    }

    fn content_path(&self, hash: &str) -> Option<PathBuf> {
        atomic::sharded_path(&self.data_directory(), hash)
    }

    /// Run the writer against a hashing sink over `temp`.
    fn write_temp(temp: &Path, writer: ContentWriter<'_>) -> std::io::Result<String> {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp)?;
        let mut sink = HashingWriter::new(BufWriter::new(file));
        writer(&mut sink)?;
        let (buffered, hash) = sink.finish()?;
        buffered.into_inner().map_err(|e| e.into_error())?;
        Ok(hash)
    }
}

#[async_trait]
impl DataCache for LocalDataCache {
    fn name(&self) -> &str {
        "local"
    }

    async fn has_content(&self, hash: &str) -> Result<bool, CacheError> {
        let Some(path) = self.content_path(hash) else {
            return Ok(false);
        };
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| CacheError::io(path, e))
    }

    async fn open(&self, hash: &str) -> Result<ContentReader, CacheError> {
        let path = self
            .content_path(hash)
            .ok_or_else(|| CacheError::ContentNotFound(hash.to_string()))?;

        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CacheError::ContentNotFound(hash.to_string()))
            }
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    async fn store(&self, writer: ContentWriter<'_>) -> Result<String, CacheError> {
        let temp = atomic::temp_file(&self.temp_directory()).await?;

        let hash = match blocking(|| Self::write_temp(&temp, writer)) {
            Ok(hash) => hash,
            Err(e) => {
                atomic::discard(&temp).await;
                return Err(CacheError::io(temp, e));
            }
        };

        // The digest is hex, so a content path always exists for it.
        let dest = self
            .content_path(&hash)
            .ok_or_else(|| CacheError::Serialization(format!("invalid digest {hash}")))?;
        atomic::publish(&temp, &dest).await?;

        debug!(hash = %hash, path = %dest.display(), "Stored content on disk");
        Ok(hash)
    }
}

/// Run blocking file I/O without stalling other tasks on a multi-threaded
/// runtime. A current-thread runtime cannot hand off its only worker, so
/// there the closure simply runs inline.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldenhammer_core::hash::sha256_hex;
    use std::io::Write;
    use std::sync::Arc;

    const VALUES: [&str; 6] = ["hello world", "a", "ab", "abc", "d", "e"];

    #[tokio::test]
    async fn written_values_can_be_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalDataCache::new(dir.path());

        let mut hashes = Vec::new();
        for value in VALUES {
            hashes.push((value, cache.store_bytes(value.as_bytes()).await.unwrap()));
        }
        for (value, hash) in hashes {
            assert_eq!(hash, sha256_hex(value));
            assert_eq!(cache.read(&hash).await.unwrap(), value.as_bytes());
        }
    }

    #[tokio::test]
    async fn layout_is_sharded_by_first_hex_character() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalDataCache::new(dir.path());
        let hash = cache.store_bytes(b"hello world").await.unwrap();

        let expected = dir.path().join("data").join(&hash[..1]).join(&hash);
        assert_eq!(std::fs::read(expected).unwrap(), b"hello world");

        // Nothing is left behind in the temp directory.
        let leftovers = std::fs::read_dir(cache.temp_directory()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn storing_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalDataCache::new(dir.path());
        let first = cache.store_bytes(b"twice").await.unwrap();
        let second = cache.store_bytes(b"twice").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.read(&first).await.unwrap(), b"twice");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_identical_stores_agree() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(LocalDataCache::new(dir.path()));
        let payload = vec![7u8; 64 * 1024];

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let payload = payload.clone();
                tokio::spawn(async move { cache.store_bytes(&payload).await.unwrap() })
            })
            .collect();

        let mut hashes = Vec::new();
        for handle in handles {
            hashes.push(handle.await.unwrap());
        }
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.read(&hashes[0]).await.unwrap(), payload);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn large_blob_is_written_off_the_async_path() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalDataCache::new(dir.path());
        let payload: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

        let hash = cache.store_bytes(&payload).await.unwrap();
        assert_eq!(hash, sha256_hex(&payload));
        assert_eq!(cache.read(&hash).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn has_content_for_stored_and_random_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalDataCache::new(dir.path());
        let hash = cache.store_bytes(b"present").await.unwrap();
        assert!(cache.has_content(&hash).await.unwrap());
        assert!(!cache.has_content(&sha256_hex("unrelated")).await.unwrap());
        assert!(!cache.has_content("not-a-hash").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_hash_fails_with_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalDataCache::new(dir.path());

        let err = cache.open("unknown").await.err().unwrap();
        assert!(matches!(err, CacheError::ContentNotFound(ref h) if h == "unknown"));

        let missing = sha256_hex("never stored");
        let err = cache.open(&missing).await.err().unwrap();
        assert!(matches!(err, CacheError::ContentNotFound(ref h) if *h == missing));
    }

    #[tokio::test]
    async fn failing_writer_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalDataCache::new(dir.path());
        let result = cache
            .store(&|sink: &mut dyn Write| {
                sink.write_all(b"partial")?;
                Err(std::io::Error::other("disk full"))
            })
            .await;

        assert!(matches!(result, Err(CacheError::Io { .. })));
        let leftovers = std::fs::read_dir(cache.temp_directory()).unwrap().count();
        assert_eq!(leftovers, 0);
        assert!(!cache.data_directory().exists());
    }
}
