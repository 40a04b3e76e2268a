//! Build execution over a configuration tree.
//!
//! Packages and bundles are walked in order. A bundle's sources are split
//! into batches of `batch_size`; each batch runs as spawned tasks on the
//! tokio runtime and is joined before the next starts. Results are collected
//! in source order whatever order the tasks finish in. The first failing
//! source aborts its bundle, its package and the rest of the build, and a
//! package is only handed to the packager once all its bundles are built.

use futures::future::join_all;
use goldenhammer_cache::{
    AssetMemoryManager, BuildOutcome, CacheKeys, Fetched, Origin, fetch_or_build,
};
use goldenhammer_core::cache::BuildCache;
use goldenhammer_core::configuration::{AssetSource, BuildConfig, BundleConfig, PackageConfig};
use goldenhammer_core::error::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dispatch::ProcessorRegistry;
use crate::stage::{AssetBundle, BuildContext, Importer, Packager};

/// Summary of one [`BuildPipeline::build`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub packages: usize,
    pub bundles: usize,
    pub assets: usize,
    /// Sources resolved from the build cache.
    pub cache_hits: usize,
    /// Sources that were imported and processed.
    pub builds: usize,
}

pub(crate) struct PipelineInner {
    pub(crate) name: String,
    pub(crate) identity: String,
    pub(crate) context: BuildContext,
    pub(crate) keys: CacheKeys,
    pub(crate) memory: Arc<AssetMemoryManager>,
    pub(crate) build_cache: Arc<dyn BuildCache>,
    pub(crate) importers: Vec<Box<dyn Importer>>,
    pub(crate) processors: ProcessorRegistry,
    pub(crate) packager: Box<dyn Packager>,
    pub(crate) batch_size: usize,
}

/// A frozen pipeline. Cheap to clone; clones share stages and storage.
#[derive(Clone)]
pub struct BuildPipeline {
    inner: Arc<PipelineInner>,
}

impl BuildPipeline {
    pub(crate) fn from_inner(inner: PipelineInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Fingerprint of the pipeline's stages. Part of every cache key.
    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    pub fn memory(&self) -> &Arc<AssetMemoryManager> {
        &self.inner.memory
    }

    pub fn batch_size(&self) -> usize {
        self.inner.batch_size
    }

    /// Build every package in `config` and hand each to the packager.
    pub async fn build(&self, config: &BuildConfig) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        for package in &config.packages {
            self.build_package(package, &mut report).await?;
        }

        info!(
            pipeline = %self.inner.name,
            packages = report.packages,
            assets = report.assets,
            cache_hits = report.cache_hits,
            builds = report.builds,
            "Build complete"
        );
        Ok(report)
    }

    async fn build_package(&self, package: &PackageConfig, report: &mut BuildReport) -> Result<()> {
        info!(package = %package.name, bundles = package.bundles.len(), "Building package");

        let mut bundles = Vec::with_capacity(package.bundles.len());
        for bundle in &package.bundles {
            bundles.push(self.build_bundle(bundle, report).await?);
        }

        self.inner
            .packager
            .package(&package.name, bundles)
            .await?;
        report.packages += 1;

        info!(package = %package.name, "Package complete");
        Ok(())
    }

    async fn build_bundle(&self, bundle: &BundleConfig, report: &mut BuildReport) -> Result<AssetBundle> {
        info!(bundle = %bundle.name, sources = bundle.assets.len(), "Building bundle");

        let mut assets = Vec::new();
        for batch in bundle.assets.chunks(self.inner.batch_size) {
            let handles: Vec<_> = batch
                .iter()
                .cloned()
                .map(|source| {
                    let inner = self.inner.clone();
                    tokio::spawn(async move { inner.build_source(source).await })
                })
                .collect();

            // join_all keeps spawn order, which is source order.
            for joined in join_all(handles).await {
                let fetched = joined.map_err(|e| Error::Task(e.to_string()))??;
                match fetched.origin {
                    Origin::Cache => report.cache_hits += 1,
                    Origin::Build => report.builds += 1,
                }
                report.assets += fetched.assets.len();
                assets.extend(fetched.assets);
            }
        }

        report.bundles += 1;
        Ok(AssetBundle {
            name: bundle.name.clone(),
            assets,
        })
    }
}

impl PipelineInner {
    async fn build_source(&self, source: AssetSource) -> Result<Fetched> {
        fetch_or_build(
            self.build_cache.as_ref(),
            &self.keys,
            &self.memory,
            &source,
            || self.import_and_process(&source),
        )
        .await
    }

    async fn import_and_process(&self, source: &AssetSource) -> Result<BuildOutcome> {
        let Some(importer) = self.importers.iter().find(|i| i.matches(&source.path)) else {
            debug!(path = %source.path, "No importer matches, skipping");
            return Ok(BuildOutcome::default());
        };

        let imported = importer.import(&self.context, source).await?;

        let mut assets = Vec::with_capacity(imported.len());
        for asset in imported {
            let asset = match self.processors.get(asset.value_type()) {
                Some(processor) => processor.process(&self.context, asset).await?,
                None => asset,
            };
            assets.push(asset);
        }

        debug!(
            path = %source.path,
            importer = %importer.identity(),
            assets = assets.len(),
            "Built source"
        );
        Ok(BuildOutcome::new(assets))
    }
}
