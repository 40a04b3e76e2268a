//! Stage traits: the host-supplied parts of a pipeline.
//!
//! Each stage declares an identity string. Identities feed the pipeline
//! identity, which is part of every cache key, so a stage must change its
//! identity whenever its output for the same input could change.

use async_trait::async_trait;
use goldenhammer_cache::ProxyAsset;
use goldenhammer_core::asset::{AnyAsset, Asset, AssetValue};
use goldenhammer_core::configuration::{AssetConfiguration, AssetSource};
use goldenhammer_core::error::StageError;
use std::path::{Path, PathBuf};

/// Turns an asset source into zero or more assets.
#[async_trait]
pub trait Importer: Send + Sync {
    fn identity(&self) -> &str;

    /// Whether this importer handles the source at `path`.
    fn matches(&self, path: &str) -> bool;

    async fn import(
        &self,
        context: &BuildContext,
        source: &AssetSource,
    ) -> Result<Vec<Box<dyn AnyAsset>>, StageError>;
}

/// Transforms assets of one value type.
///
/// A pipeline runs at most one processor per input type.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    type Input: AssetValue;
    type Output: AssetValue;

    fn identity(&self) -> &str;

    async fn process(
        &self,
        context: &BuildContext,
        asset: Asset<Self::Input>,
    ) -> Result<Asset<Self::Output>, StageError>;
}

/// Receives each finished package.
#[async_trait]
pub trait Packager: Send + Sync {
    fn identity(&self) -> &str;

    async fn package(&self, name: &str, bundles: Vec<AssetBundle>) -> Result<(), StageError>;
}

/// Processor composition.
pub trait ProcessorExt: Processor + Sized {
    /// Feed this processor's output into `next`.
    fn then<B>(self, next: B) -> Chain<Self, B>
    where
        B: Processor<Input = Self::Output>,
    {
        let identity = format!("{}-{}", self.identity(), next.identity());
        Chain {
            first: self,
            second: next,
            identity,
        }
    }
}

impl<P: Processor> ProcessorExt for P {}

/// Two processors run back to back. Built by [`ProcessorExt::then`].
pub struct Chain<A, B> {
    first: A,
    second: B,
    identity: String,
}

#[async_trait]
impl<A, B> Processor for Chain<A, B>
where
    A: Processor,
    B: Processor<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    fn identity(&self) -> &str {
        &self.identity
    }

    async fn process(
        &self,
        context: &BuildContext,
        asset: Asset<Self::Input>,
    ) -> Result<Asset<Self::Output>, StageError> {
        let intermediate = self.first.process(context, asset).await?;
        self.second.process(context, intermediate).await
    }
}

/// What importers and processors can see of the running pipeline.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pipeline_identity: String,
    source_root: PathBuf,
}

impl BuildContext {
    pub fn new(pipeline_identity: impl Into<String>, source_root: impl Into<PathBuf>) -> Self {
        Self {
            pipeline_identity: pipeline_identity.into(),
            source_root: source_root.into(),
        }
    }

    pub fn pipeline_identity(&self) -> &str {
        &self.pipeline_identity
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Absolute location of a source path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.source_root.join(path)
    }

    pub fn asset<T: AssetValue>(
        &self,
        identifier: impl Into<String>,
        configuration: AssetConfiguration,
        value: T,
    ) -> Asset<T> {
        Asset::new(identifier, configuration, value)
    }
}

/// A built bundle: its name and the proxies of its assets in source order.
#[derive(Debug, Clone)]
pub struct AssetBundle {
    pub name: String,
    pub assets: Vec<ProxyAsset>,
}

/// Source path match for [`Importer::matches`].
#[derive(Debug, Clone)]
pub struct PathFilter {
    rule: Rule,
}

#[derive(Debug, Clone)]
enum Rule {
    Any,
    Extension(String),
    Pattern(regex_lite::Regex),
}

impl PathFilter {
    /// Paths matching a regular expression.
    pub fn new(pattern: &str) -> Result<Self, regex_lite::Error> {
        Ok(Self {
            rule: Rule::Pattern(regex_lite::Regex::new(pattern)?),
        })
    }

    /// Matches every path.
    pub fn any() -> Self {
        Self { rule: Rule::Any }
    }

    /// Paths whose extension is `extension` (without the dot).
    pub fn extension(extension: impl Into<String>) -> Self {
        Self {
            rule: Rule::Extension(extension.into()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match &self.rule {
            Rule::Any => true,
            Rule::Extension(ext) => Path::new(path)
                .extension()
                .is_some_and(|e| e == ext.as_str()),
            Rule::Pattern(pattern) => pattern.is_match(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Append(&'static str);

    #[async_trait]
    impl Processor for Append {
        type Input = String;
        type Output = String;

        fn identity(&self) -> &str {
            self.0
        }

        async fn process(
            &self,
            _context: &BuildContext,
            asset: Asset<String>,
        ) -> Result<Asset<String>, StageError> {
            let suffix = self.0;
            Ok(asset.map(|v| format!("{v}{suffix}")))
        }
    }

    struct Length;

    #[async_trait]
    impl Processor for Length {
        type Input = String;
        type Output = usize;

        fn identity(&self) -> &str {
            "length"
        }

        async fn process(
            &self,
            _context: &BuildContext,
            asset: Asset<String>,
        ) -> Result<Asset<usize>, StageError> {
            Ok(asset.map(|v| v.len()))
        }
    }

    fn context() -> BuildContext {
        BuildContext::new("pipeline", "/assets")
    }

    #[tokio::test]
    async fn chain_runs_in_order() {
        let chain = Append("a").then(Append("b")).then(Length);
        assert_eq!(chain.identity(), "a-b-length");

        let asset = context().asset("x", AssetConfiguration::new(), String::from("xy"));
        let out = chain.process(&context(), asset).await.unwrap();
        assert_eq!(out.identifier(), "x");
        assert_eq!(*out.value(), 4);
    }

    #[test]
    fn path_filters() {
        let png = PathFilter::extension("png");
        assert!(png.matches("textures/wood.png"));
        assert!(!png.matches("textures/wood.png.bak"));
        assert!(!png.matches("textures/woodpng"));

        assert!(PathFilter::any().matches("anything/at/all"));

        let dir = PathFilter::new(r"^Test/File/").unwrap();
        assert!(dir.matches("Test/File/1.txt"));
        assert!(!dir.matches("Other/1.txt"));
        assert!(PathFilter::new("(").is_err());
    }

    #[test]
    fn context_resolves_against_source_root() {
        let context = context();
        assert_eq!(context.resolve("a/b.txt"), Path::new("/assets/a/b.txt"));
        assert_eq!(context.pipeline_identity(), "pipeline");
    }
}
