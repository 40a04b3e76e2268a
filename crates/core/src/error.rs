//! Error types for the GoldenHammer domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all GoldenHammer operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Cache errors ---
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    // --- Stage errors ---
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    // --- Asset errors ---
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Concurrency ---
    #[error("Build task failed: {0}")]
    Task(String),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors raised by the content-addressed store and the build-cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The content store holds nothing under the requested hash.
    #[error("No content with the expected SHA-256 found: {0}")]
    ContentNotFound(String),

    /// A persisted proxy could not be turned back into a live asset.
    ///
    /// Fetch-or-build treats this as a cache miss and rebuilds.
    #[error("Cached record cannot be resolved: {reason}")]
    Unresolvable { reason: String },

    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache serialization failed: {0}")]
    Serialization(String),
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error means "not in the cache" rather than a broken cache.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::ContentNotFound(_) | Self::Unresolvable { .. })
    }
}

/// Failures inside host-supplied importers, processors and packagers.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Import failed: {importer} on {path}: {reason}")]
    ImportFailed {
        importer: String,
        path: String,
        reason: String,
    },

    #[error("Processing failed: {processor} on {identifier}: {reason}")]
    ProcessFailed {
        processor: String,
        identifier: String,
        reason: String,
    },

    #[error("Packaging failed: {packager} on {package}: {reason}")]
    PackageFailed {
        packager: String,
        package: String,
        reason: String,
    },

    #[error("Processor {processor} expected {expected} but received {actual}")]
    UnexpectedInput {
        processor: String,
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Asset {identifier} holds {actual}, not {expected}")]
    TypeMismatch {
        identifier: String,
        expected: &'static str,
        actual: String,
    },

    #[error("Type tag {tag} is already bound to {existing}, cannot rebind to {requested}")]
    TagConflict {
        tag: String,
        existing: &'static str,
        requested: &'static str,
    },
}
