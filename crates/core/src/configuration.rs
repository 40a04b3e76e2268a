//! The build configuration tree: packages of bundles of asset sources.
//!
//! Pure data. Hosts build or deserialize it however they like; the core only
//! reads it, hashes it and serializes it into cache keys.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form per-asset settings, interpreted only by importers and processors.
///
/// Keys are kept sorted so the serialized form (and therefore every cache key
/// derived from it) does not depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetConfiguration {
    values: BTreeMap<String, serde_json::Value>,
}

impl AssetConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Typed lookup. Returns `None` when the key is absent or holds a value of
    /// another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn raw(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Canonical JSON encoding used as cache-key input.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.values).unwrap_or_default()
    }
}

/// A single pipeline input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSource {
    /// Path of the source file, relative to the pipeline's source root.
    pub path: String,

    #[serde(default, skip_serializing_if = "AssetConfiguration::is_empty")]
    pub configuration: AssetConfiguration,
}

impl AssetSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            configuration: AssetConfiguration::default(),
        }
    }

    pub fn with_configuration(mut self, configuration: AssetConfiguration) -> Self {
        self.configuration = configuration;
        self
    }
}

/// A named, ordered list of asset sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleConfig {
    pub name: String,

    #[serde(default)]
    pub assets: Vec<AssetSource>,
}

impl BundleConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assets: Vec::new(),
        }
    }

    pub fn asset(mut self, source: AssetSource) -> Self {
        self.assets.push(source);
        self
    }
}

/// A named list of bundles, handed to the packager as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub name: String,

    #[serde(default)]
    pub bundles: Vec<BundleConfig>,
}

impl PackageConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bundles: Vec::new(),
        }
    }

    pub fn bundle(mut self, bundle: BundleConfig) -> Self {
        self.bundles.push(bundle);
        self
    }
}

/// Root of the configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub packages: Vec<PackageConfig>,
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package(mut self, package: PackageConfig) -> Self {
        self.packages.push(package);
        self
    }

    /// Total number of asset sources across all packages.
    pub fn source_count(&self) -> usize {
        self.packages
            .iter()
            .flat_map(|p| &p.bundles)
            .map(|b| b.assets.len())
            .sum()
    }
}
