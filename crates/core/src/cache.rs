//! Storage traits for the content-addressed data cache and the build-cache store.
//!
//! The data cache (CAS) holds serialized asset values keyed by the SHA-256 of
//! their bytes. The build cache maps a cache key (a fingerprint of the
//! pipeline and one asset source) to a [`CacheRecord`] describing what a
//! previous build produced.
//!
//! Implementations: in-memory, on-disk, and (for the build cache) a no-op
//! store that disables caching.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::CacheError;

/// A byte stream opened from the data cache.
pub type ContentReader = Box<dyn AsyncRead + Send + Unpin>;

/// Streams content into the hashing sink handed to [`DataCache::store`].
pub type ContentWriter<'a> = &'a (dyn Fn(&mut dyn Write) -> std::io::Result<()> + Send + Sync);

/// Content-addressed byte store.
#[async_trait]
pub trait DataCache: Send + Sync {
    /// The store name (e.g., "memory", "local").
    fn name(&self) -> &str;

    /// Whether content with this hash is present.
    async fn has_content(&self, hash: &str) -> Result<bool, CacheError>;

    /// Open the content stored under `hash`.
    ///
    /// Fails with [`CacheError::ContentNotFound`] naming the hash when absent.
    async fn open(&self, hash: &str) -> Result<ContentReader, CacheError>;

    /// Run `writer` against a hashing sink and keep the bytes under their
    /// hex digest, which is returned.
    async fn store(&self, writer: ContentWriter<'_>) -> Result<String, CacheError>;

    /// Store a byte slice.
    async fn store_bytes(&self, bytes: &[u8]) -> Result<String, CacheError> {
        self.store(&|sink: &mut dyn Write| sink.write_all(bytes)).await
    }

    /// Open and read the whole content.
    async fn read(&self, hash: &str) -> Result<Vec<u8>, CacheError> {
        let mut reader = self.open(hash).await?;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| CacheError::io(hash, e))?;
        Ok(bytes)
    }
}

/// What the build cache knows about one cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheRecord {
    /// Nothing stored under the key.
    NotCached,

    /// Serialized proxy metadata for every asset the build produced.
    Cached {
        #[serde(with = "blobs")]
        assets: Vec<Vec<u8>>,
    },

    /// The key is missing inputs that were only discovered while building;
    /// recompute it with the hashes of these files and fetch again.
    IncompleteKey { missing_inputs: Vec<String> },
}

impl CacheRecord {
    pub fn found(assets: Vec<Vec<u8>>) -> Self {
        Self::Cached { assets }
    }

    pub fn incomplete(missing_inputs: Vec<String>) -> Self {
        Self::IncompleteKey { missing_inputs }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached { .. })
    }
}

/// Key → record persistence for build results.
#[async_trait]
pub trait BuildCache: Send + Sync {
    /// The store name (e.g., "none", "memory", "local").
    fn name(&self) -> &str;

    /// Fetch the record for `key`; [`CacheRecord::NotCached`] when absent.
    async fn fetch(&self, key: &str) -> Result<CacheRecord, CacheError>;

    /// Persist `record` under `key`, replacing any previous record.
    async fn store(&self, key: &str, record: &CacheRecord) -> Result<(), CacheError>;
}

/// Proxy blobs travel as base64 strings inside the JSON record.
mod blobs {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(blobs: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(blobs.iter().map(|b| STANDARD.encode(b)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| STANDARD.decode(s).map_err(de::Error::custom))
            .collect()
    }
}
