//! Pipeline construction.

use goldenhammer_cache::{
    AssetMemoryManager, CacheKeys, InMemoryBuildCache, LocalBuildCache, LocalDataCache,
    MemoryDataCache, NullBuildCache,
};
use goldenhammer_config::HammerConfig;
use goldenhammer_core::asset::AssetValue;
use goldenhammer_core::cache::{BuildCache, DataCache};
use goldenhammer_core::error::{AssetError, Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::dispatch::{ProcessorRegistry, erase};
use crate::executor::{BuildPipeline, PipelineInner};
use crate::identity::pipeline_identity;
use crate::stage::{BuildContext, Importer, Packager, Processor};

type Registration = Box<dyn FnOnce(&AssetMemoryManager) -> std::result::Result<(), AssetError> + Send>;

/// Collects the stages and storage of a pipeline, then freezes them with
/// [`PipelineBuilder::create`].
pub struct PipelineBuilder {
    name: String,
    data_cache: Arc<dyn DataCache>,
    build_cache: Arc<dyn BuildCache>,
    packager: Box<dyn Packager>,
    importers: Vec<Box<dyn Importer>>,
    processors: ProcessorRegistry,
    registrations: Vec<Registration>,
    source_root: PathBuf,
    batch_size: Option<usize>,
}

impl PipelineBuilder {
    pub fn start(
        name: impl Into<String>,
        data_cache: Arc<dyn DataCache>,
        build_cache: Arc<dyn BuildCache>,
        packager: impl Packager + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            data_cache,
            build_cache,
            packager: Box::new(packager),
            importers: Vec::new(),
            processors: ProcessorRegistry::new(),
            registrations: Vec::new(),
            source_root: PathBuf::from("."),
            batch_size: None,
        }
    }

    /// Start from ambient settings: storage per `config.cache`, source root
    /// and batch size per `config.build`.
    pub fn from_config(
        name: impl Into<String>,
        config: &HammerConfig,
        packager: impl Packager + 'static,
    ) -> Result<Self> {
        config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let cache = &config.cache;
        let data_cache: Arc<dyn DataCache> = if cache.persistent {
            Arc::new(LocalDataCache::new(&cache.data_dir))
        } else {
            Arc::new(MemoryDataCache::new())
        };
        let build_cache: Arc<dyn BuildCache> = match (cache.enabled, cache.persistent) {
            (false, _) => Arc::new(NullBuildCache),
            (true, true) => Arc::new(LocalBuildCache::new(&cache.records_dir)),
            (true, false) => Arc::new(InMemoryBuildCache::new()),
        };

        let mut builder = Self::start(name, data_cache, build_cache, packager)
            .source_root(&config.build.source_root);
        builder.batch_size = config.build.batch_size;
        Ok(builder)
    }

    /// Add an importer. Importers are tried in the order added.
    pub fn importer(mut self, importer: impl Importer + 'static) -> Self {
        self.importers.push(Box::new(importer));
        self
    }

    /// Add a processor for its input type, replacing any earlier one.
    pub fn processor<P: Processor>(mut self, processor: P) -> Self {
        self.processors.register(erase(processor));
        self
    }

    /// Declare a value type produced without a processor (straight from an
    /// importer) so cached proxies of it resolve in later runs.
    pub fn asset_type<T: AssetValue>(mut self) -> Self {
        self.registrations
            .push(Box::new(|memory: &AssetMemoryManager| memory.register::<T>()));
        self
    }

    /// Like [`PipelineBuilder::asset_type`] with a custom persistent tag.
    pub fn asset_type_as<T: AssetValue>(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.registrations
            .push(Box::new(move |memory: &AssetMemoryManager| memory.register_as::<T>(tag)));
        self
    }

    pub fn source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = root.into();
        self
    }

    /// Sources built concurrently per batch. Zero is treated as one.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size.max(1));
        self
    }

    pub fn create(self) -> Result<BuildPipeline> {
        let memory = AssetMemoryManager::new(self.data_cache);
        for registration in self.registrations {
            registration(memory.as_ref())?;
        }
        for processor in self.processors.iter() {
            processor.register_types(&memory)?;
        }

        let importer_ids: Vec<&str> = self.importers.iter().map(|i| i.identity()).collect();
        let identity = pipeline_identity(
            &self.name,
            &importer_ids,
            &self.processors.identities(),
            self.packager.identity(),
        );

        let batch_size = self.batch_size.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        info!(
            pipeline = %self.name,
            identity = %identity,
            importers = self.importers.len(),
            processors = self.processors.len(),
            batch_size,
            "Pipeline created"
        );

        Ok(BuildPipeline::from_inner(PipelineInner {
            context: BuildContext::new(identity.clone(), self.source_root.clone()),
            keys: CacheKeys::new(identity.clone(), self.source_root),
            name: self.name,
            identity,
            memory,
            build_cache: self.build_cache,
            importers: self.importers,
            processors: self.processors,
            packager: self.packager,
            batch_size,
        }))
    }
}
