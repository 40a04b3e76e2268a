//! Build-cache stores: cache key to [`CacheRecord`] persistence.
//!
//! [`CacheRecord`]: goldenhammer_core::CacheRecord

pub mod local;
pub mod memory;
pub mod noop;

pub use local::LocalBuildCache;
pub use memory::InMemoryBuildCache;
pub use noop::NullBuildCache;
