//! Caching subsystem for GoldenHammer.
//!
//! - [`data`]: content-addressed stores for serialized asset values
//! - [`record`]: build-cache stores mapping cache keys to [`CacheRecord`]s
//! - [`manager`]: the asset memory manager and proxy assets
//! - [`fetch`]: the fetch-or-build protocol tying them together
//!
//! [`CacheRecord`]: goldenhammer_core::CacheRecord

mod atomic;
pub mod data;
pub mod record;
pub mod key;
pub mod manager;
pub mod fetch;

pub use data::{LocalDataCache, MemoryDataCache};
pub use record::{InMemoryBuildCache, LocalBuildCache, NullBuildCache};
pub use key::CacheKeys;
pub use manager::{AssetMemoryManager, ProxyAsset, ProxyMeta};
pub use fetch::{BuildOutcome, Fetched, Origin, fetch_or_build};
