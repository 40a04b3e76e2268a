//! Content-addressed data caches.

pub mod memory;
pub mod local;

pub use memory::MemoryDataCache;
pub use local::LocalDataCache;
