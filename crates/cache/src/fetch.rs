//! Fetch-or-build: resolve one asset source from the build cache, or build it
//! and record the result.
//!
//! A source's key may be incomplete: some inputs (an included file, say) are
//! only discovered while building. Such builds leave an
//! [`CacheRecord::IncompleteKey`] under the source's initial key naming the
//! extra inputs, and the real record under the key extended with their
//! hashes. A later fetch follows that indirection, so an unchanged source
//! resolves in two lookups and a changed include misses.

use goldenhammer_core::asset::AnyAsset;
use goldenhammer_core::cache::{BuildCache, CacheRecord};
use goldenhammer_core::configuration::AssetSource;
use goldenhammer_core::error::{CacheError, Result};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::key::CacheKeys;
use crate::manager::{AssetMemoryManager, ProxyAsset};

/// What a real build of one source produced.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub assets: Vec<Box<dyn AnyAsset>>,
    /// Input files found during the build that the initial key did not cover.
    pub discovered_inputs: Vec<String>,
}

impl BuildOutcome {
    pub fn new(assets: Vec<Box<dyn AnyAsset>>) -> Self {
        Self {
            assets,
            discovered_inputs: Vec::new(),
        }
    }

    pub fn with_discovered_inputs(mut self, inputs: Vec<String>) -> Self {
        self.discovered_inputs = inputs;
        self
    }
}

/// Where fetched assets came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Build,
}

/// The proxies for one source.
#[derive(Debug)]
pub struct Fetched {
    pub assets: Vec<ProxyAsset>,
    pub origin: Origin,
}

/// Resolve `source` from `cache`, falling back to `build`.
///
/// Records whose proxies no longer resolve are rebuilt; every other storage
/// error is returned, as is any error from `build`.
pub async fn fetch_or_build<F, Fut>(
    cache: &dyn BuildCache,
    keys: &CacheKeys,
    memory: &Arc<AssetMemoryManager>,
    source: &AssetSource,
    build: F,
) -> Result<Fetched>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<BuildOutcome>> + Send,
{
    let initial = keys.compute(source, &[]).await?;
    let mut key = initial.clone();
    let mut visited = HashSet::new();

    loop {
        if !visited.insert(key.clone()) {
            debug!(path = %source.path, key = %key, "Cache key revisited, rebuilding");
            break;
        }

        match cache.fetch(&key).await? {
            CacheRecord::Cached { assets } => match resolve(memory, &assets).await {
                Ok(proxies) => {
                    debug!(path = %source.path, key = %key, assets = proxies.len(), "Cache hit");
                    return Ok(Fetched {
                        assets: proxies,
                        origin: Origin::Cache,
                    });
                }
                Err(e) if e.is_miss() => {
                    warn!(path = %source.path, key = %key, error = %e, "Cached record unresolvable, rebuilding");
                    break;
                }
                Err(e) => return Err(e.into()),
            },
            CacheRecord::IncompleteKey { missing_inputs } => {
                key = keys.compute(source, &missing_inputs).await?;
                debug!(path = %source.path, inputs = ?missing_inputs, key = %key, "Escalated cache key");
            }
            CacheRecord::NotCached => {
                debug!(path = %source.path, key = %key, "Cache miss");
                break;
            }
        }
    }

    let outcome = build().await?;

    let mut proxies = Vec::with_capacity(outcome.assets.len());
    for asset in &outcome.assets {
        proxies.push(memory.create_proxy(asset.as_ref()).await?);
    }
    let blobs = proxies
        .iter()
        .map(|proxy| memory.serialize_proxy(proxy))
        .collect::<std::result::Result<Vec<_>, CacheError>>()?;
    let record = CacheRecord::found(blobs);

    if outcome.discovered_inputs.is_empty() {
        cache.store(&key, &record).await?;
    } else {
        let escalated = keys.compute(source, &outcome.discovered_inputs).await?;
        cache
            .store(&initial, &CacheRecord::incomplete(outcome.discovered_inputs.clone()))
            .await?;
        cache.store(&escalated, &record).await?;
    }

    Ok(Fetched {
        assets: proxies,
        origin: Origin::Build,
    })
}

async fn resolve(
    memory: &Arc<AssetMemoryManager>,
    blobs: &[Vec<u8>],
) -> std::result::Result<Vec<ProxyAsset>, CacheError> {
    futures::future::try_join_all(blobs.iter().map(|blob| memory.deserialize_proxy(blob))).await
}
