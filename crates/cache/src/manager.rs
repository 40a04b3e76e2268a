//! Asset memory manager: moves asset values in and out of the content store.
//!
//! Materialized assets are turned into [`ProxyAsset`]s by serializing their
//! value into the data cache. A proxy only remembers the content hash; its
//! value is decoded on demand and shared between every proxy that points at
//! the same content, for as long as somebody holds on to it.
//!
//! Value types are bound to a persistent type tag in a registry keyed by
//! `TypeId`. Proxies persisted in build records carry the tag, which is how
//! a later run finds the codec to revive them with.

use goldenhammer_core::asset::{AnyAsset, AssetValue, JsonCodec, ValueCodec};
use goldenhammer_core::cache::DataCache;
use goldenhammer_core::configuration::AssetConfiguration;
use goldenhammer_core::error::{AssetError, CacheError, Result};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tracing::{debug, warn};

/// Dead entries are pruned from the decode cache once it grows past this.
const PRUNE_THRESHOLD: usize = 256;

type Decoded = Arc<dyn Any + Send + Sync>;

/// A value type bound to its persistent tag.
struct TypeBinding {
    tag: String,
    codec: Arc<dyn ValueCodec>,
}

#[derive(Default)]
struct Registry {
    by_type: HashMap<TypeId, Arc<TypeBinding>>,
    by_tag: HashMap<String, Arc<TypeBinding>>,
}

/// Owns the type registry and the shared decode cache for one data cache.
pub struct AssetMemoryManager {
    storage: Arc<dyn DataCache>,
    registry: RwLock<Registry>,
    decoded: Mutex<HashMap<(String, TypeId), Weak<dyn Any + Send + Sync>>>,
}

impl AssetMemoryManager {
    pub fn new(storage: Arc<dyn DataCache>) -> Arc<Self> {
        Arc::new(Self {
            storage,
            registry: RwLock::new(Registry::default()),
            decoded: Mutex::new(HashMap::new()),
        })
    }

    pub fn storage(&self) -> &Arc<dyn DataCache> {
        &self.storage
    }

    /// Register `T` under its Rust type name.
    pub fn register<T: AssetValue>(&self) -> std::result::Result<(), AssetError> {
        self.register_as::<T>(std::any::type_name::<T>())
    }

    /// Register `T` under a custom tag.
    ///
    /// Registering the same type twice is harmless. New proxies use the most
    /// recent tag; earlier tags keep resolving. Binding a tag that already
    /// belongs to a different type fails with [`AssetError::TagConflict`].
    pub fn register_as<T: AssetValue>(&self, tag: impl Into<String>) -> std::result::Result<(), AssetError> {
        self.bind(tag.into(), Arc::new(JsonCodec::<T>::new()))
            .map(|_| ())
    }

    /// Register `T` under its Rust type name unless it is already bound.
    /// An existing binding, custom tag included, is left untouched.
    pub fn register_if_absent<T: AssetValue>(&self) -> std::result::Result<(), AssetError> {
        if self.tag_of::<T>().is_some() {
            return Ok(());
        }
        self.register::<T>()
    }

    /// Tag new proxies of type `T` would carry, if `T` is registered.
    pub fn tag_of<T: AssetValue>(&self) -> Option<String> {
        self.read_registry()
            .by_type
            .get(&TypeId::of::<T>())
            .map(|b| b.tag.clone())
    }

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn bind(
        &self,
        tag: String,
        codec: Arc<dyn ValueCodec>,
    ) -> std::result::Result<Arc<TypeBinding>, AssetError> {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);

        let binding = match registry.by_tag.get(&tag) {
            Some(existing) if existing.codec.value_type() == codec.value_type() => existing.clone(),
            Some(existing) => {
                return Err(AssetError::TagConflict {
                    tag,
                    existing: existing.codec.type_name(),
                    requested: codec.type_name(),
                });
            }
            None => {
                let binding = Arc::new(TypeBinding { tag: tag.clone(), codec });
                registry.by_tag.insert(tag, binding.clone());
                binding
            }
        };

        registry
            .by_type
            .insert(binding.codec.value_type(), binding.clone());
        Ok(binding)
    }

    /// Binding for the asset's value type, registering it on first sight.
    fn binding_for(&self, asset: &dyn AnyAsset) -> std::result::Result<Arc<TypeBinding>, AssetError> {
        if let Some(binding) = self.read_registry().by_type.get(&asset.value_type()) {
            return Ok(binding.clone());
        }
        warn!(
            value_type = asset.value_type_name(),
            "Unregistered asset type bound on first use; cached proxies of it will not \
             resolve in a fresh process unless it is declared with PipelineBuilder::asset_type"
        );
        self.bind(asset.value_type_name().to_string(), asset.codec())
    }

    /// Persist the asset's value and return a proxy for it.
    pub async fn create_proxy(self: &Arc<Self>, asset: &dyn AnyAsset) -> Result<ProxyAsset> {
        let binding = self.binding_for(asset)?;
        let bytes = binding.codec.encode(asset)?;
        let content_hash = self.storage.store_bytes(&bytes).await?;

        debug!(
            identifier = %asset.identifier(),
            type_tag = %binding.tag,
            hash = %content_hash,
            "Created proxy asset"
        );

        Ok(ProxyAsset {
            meta: ProxyMeta {
                type_tag: binding.tag.clone(),
                identifier: asset.identifier().to_string(),
                configuration: asset.configuration().clone(),
                content_hash,
            },
            binding,
            manager: self.clone(),
        })
    }

    /// Encode a proxy for storage inside a build record.
    pub fn serialize_proxy(&self, proxy: &ProxyAsset) -> std::result::Result<Vec<u8>, CacheError> {
        serde_json::to_vec(&proxy.meta).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Revive a proxy from a build record.
    ///
    /// Malformed bytes, an unregistered type tag or content that is no longer
    /// in the data cache all fail with [`CacheError::Unresolvable`].
    pub async fn deserialize_proxy(self: &Arc<Self>, bytes: &[u8]) -> std::result::Result<ProxyAsset, CacheError> {
        let meta: ProxyMeta = serde_json::from_slice(bytes).map_err(|e| CacheError::Unresolvable {
            reason: format!("malformed proxy: {e}"),
        })?;

        let binding = {
            let registry = self.read_registry();
            registry.by_tag.get(&meta.type_tag).cloned()
        };
        let binding = binding.ok_or_else(|| CacheError::Unresolvable {
            reason: format!("unknown type tag {}", meta.type_tag),
        })?;

        if !self.storage.has_content(&meta.content_hash).await? {
            return Err(CacheError::Unresolvable {
                reason: format!("content {} is gone", meta.content_hash),
            });
        }

        Ok(ProxyAsset {
            meta,
            binding,
            manager: self.clone(),
        })
    }

    /// Decode the value behind `proxy` as `T`.
    pub async fn load<T: AssetValue>(&self, proxy: &ProxyAsset) -> Result<Arc<T>> {
        let mismatch = || AssetError::TypeMismatch {
            identifier: proxy.meta.identifier.clone(),
            expected: std::any::type_name::<T>(),
            actual: proxy.binding.codec.type_name().to_string(),
        };

        if proxy.binding.codec.value_type() != TypeId::of::<T>() {
            return Err(mismatch().into());
        }
        let value = self
            .load_value(&proxy.meta.content_hash, &proxy.binding.codec)
            .await?;
        value.downcast::<T>().map_err(|_| mismatch().into())
    }

    async fn load_value(&self, hash: &str, codec: &Arc<dyn ValueCodec>) -> Result<Decoded> {
        let key = (hash.to_string(), codec.value_type());

        if let Some(value) = self.cached(&key) {
            return Ok(value);
        }

        // Decoding happens outside the lock; racing loads may both decode.
        let bytes = self.storage.read(hash).await?;
        let value = codec
            .decode(&bytes)
            .map_err(|e| CacheError::Serialization(format!("cannot decode {hash}: {e}")))?;

        let mut decoded = self.decoded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = decoded.get(&key).and_then(Weak::upgrade) {
            return Ok(existing);
        }
        if decoded.len() >= PRUNE_THRESHOLD {
            decoded.retain(|_, weak| weak.strong_count() > 0);
        }
        decoded.insert(key, Arc::downgrade(&value));
        Ok(value)
    }

    fn cached(&self, key: &(String, TypeId)) -> Option<Decoded> {
        self.decoded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(Weak::upgrade)
    }

    /// Live entries in the decode cache.
    pub fn live_values(&self) -> usize {
        self.decoded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

/// The persisted part of a proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyMeta {
    pub type_tag: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "AssetConfiguration::is_empty")]
    pub configuration: AssetConfiguration,
    pub content_hash: String,
}

/// Stand-in for an asset whose value lives in the data cache.
#[derive(Clone)]
pub struct ProxyAsset {
    meta: ProxyMeta,
    binding: Arc<TypeBinding>,
    manager: Arc<AssetMemoryManager>,
}

impl ProxyAsset {
    pub fn identifier(&self) -> &str {
        &self.meta.identifier
    }

    pub fn configuration(&self) -> &AssetConfiguration {
        &self.meta.configuration
    }

    pub fn content_hash(&self) -> &str {
        &self.meta.content_hash
    }

    pub fn type_tag(&self) -> &str {
        &self.meta.type_tag
    }

    pub fn meta(&self) -> &ProxyMeta {
        &self.meta
    }

    pub fn value_type(&self) -> TypeId {
        self.binding.codec.value_type()
    }

    pub fn value_type_name(&self) -> &'static str {
        self.binding.codec.type_name()
    }

    pub fn is<T: AssetValue>(&self) -> bool {
        self.value_type() == TypeId::of::<T>()
    }

    /// Load the value, failing with [`AssetError::TypeMismatch`] unless it is a `T`.
    pub async fn load<T: AssetValue>(&self) -> Result<Arc<T>> {
        self.manager.load(self).await
    }
}

impl std::fmt::Debug for ProxyAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyAsset")
            .field("identifier", &self.meta.identifier)
            .field("type_tag", &self.meta.type_tag)
            .field("content_hash", &self.meta.content_hash)
            .finish()
    }
}
