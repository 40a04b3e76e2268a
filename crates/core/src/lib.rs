//! # GoldenHammer Core
//!
//! Domain types, traits, and error definitions for the GoldenHammer asset
//! build pipeline. This crate defines the model that the cache and pipeline
//! crates implement against.
//!
//! Storage is defined as the [`DataCache`] and [`BuildCache`] traits;
//! in-memory, on-disk and disabled implementations live in
//! `goldenhammer-cache`.

pub mod error;
pub mod hash;
pub mod asset;
pub mod configuration;
pub mod cache;

// Re-export key types at crate root for ergonomics
pub use error::{AssetError, CacheError, Error, Result, StageError};
pub use hash::{HashingWriter, sha256_hex, empty_digest};
pub use asset::{AnyAsset, Asset, AssetValue, JsonCodec, ValueCodec};
pub use configuration::{
    AssetConfiguration, AssetSource, BuildConfig, BundleConfig, PackageConfig,
};
pub use cache::{BuildCache, CacheRecord, ContentReader, ContentWriter, DataCache};
