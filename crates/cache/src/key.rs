//! Cache-key computation.
//!
//! A key fingerprints one asset source under one pipeline: the pipeline
//! identity, the source path, the bytes of the source file, the source's
//! configuration and the bytes of any extra input files. Files that do not
//! exist contribute the digest of the empty string.

use goldenhammer_core::configuration::AssetSource;
use goldenhammer_core::error::CacheError;
use goldenhammer_core::hash::empty_digest;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Computes cache keys for sources of one pipeline.
#[derive(Debug, Clone)]
pub struct CacheKeys {
    pipeline: String,
    source_root: PathBuf,
}

impl CacheKeys {
    pub fn new(pipeline_identity: impl Into<String>, source_root: impl Into<PathBuf>) -> Self {
        Self {
            pipeline: pipeline_identity.into(),
            source_root: source_root.into(),
        }
    }

    pub fn pipeline_identity(&self) -> &str {
        &self.pipeline
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Key for `source`, extended with the hashes of `inputs` in order.
    pub async fn compute(&self, source: &AssetSource, inputs: &[String]) -> Result<String, CacheError> {
        let mut hasher = Sha256::new();
        let mut line = |part: &str| {
            hasher.update(part.as_bytes());
            hasher.update(b"\n");
        };

        line(&self.pipeline);
        line(&source.path);
        line(&self.hash_file(&source.path).await?);
        line(&source.configuration.canonical_json());
        for input in inputs {
            line(input);
            line(&self.hash_file(input).await?);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    async fn hash_file(&self, relative: &str) -> Result<String, CacheError> {
        let path = self.source_root.join(relative);
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(empty_digest()),
            Err(e) => return Err(CacheError::io(path, e)),
        };

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| CacheError::io(&path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}
