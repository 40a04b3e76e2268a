//! # GoldenHammer Pipeline
//!
//! Wires host-supplied importers, processors and a packager into a build
//! pipeline, and runs builds over a configuration tree with per-source
//! caching.
//!
//! ```text
//! source ─▶ importer ─▶ processor (by value type) ─▶ proxy ─▶ bundle ─▶ packager
//! ```
//!
//! Sources of one bundle are built concurrently in fixed-size batches;
//! packages and bundles are walked in order.

pub mod stage;
pub mod dispatch;
pub mod identity;
pub mod builder;
pub mod executor;

pub use stage::{
    AssetBundle, BuildContext, Chain, Importer, Packager, PathFilter, Processor, ProcessorExt,
};
pub use builder::PipelineBuilder;
pub use executor::{BuildPipeline, BuildReport};
