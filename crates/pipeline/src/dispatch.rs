//! Type-erased processor dispatch.
//!
//! Processors are generic over their input type, but the executor only sees
//! `Box<dyn AnyAsset>`. Each processor is wrapped once at registration in an
//! adapter keyed by its input `TypeId`; at build time the executor looks up
//! the adapter for an asset's value type and the adapter downcasts.

use async_trait::async_trait;
use goldenhammer_cache::AssetMemoryManager;
use goldenhammer_core::asset::AnyAsset;
use goldenhammer_core::error::{AssetError, StageError};
use std::any::TypeId;
use std::collections::HashMap;

use crate::stage::{BuildContext, Processor};

/// A processor with its input and output types erased.
#[async_trait]
pub trait ErasedProcessor: Send + Sync {
    fn identity(&self) -> &str;

    fn input_type(&self) -> TypeId;

    /// Register the input and output value types with the memory manager,
    /// keeping any tag they were already declared under.
    fn register_types(&self, memory: &AssetMemoryManager) -> Result<(), AssetError>;

    async fn process(
        &self,
        context: &BuildContext,
        asset: Box<dyn AnyAsset>,
    ) -> Result<Box<dyn AnyAsset>, StageError>;
}

struct Typed<P>(P);

#[async_trait]
impl<P: Processor> ErasedProcessor for Typed<P> {
    fn identity(&self) -> &str {
        self.0.identity()
    }

    fn input_type(&self) -> TypeId {
        TypeId::of::<P::Input>()
    }

    fn register_types(&self, memory: &AssetMemoryManager) -> Result<(), AssetError> {
        memory.register_if_absent::<P::Input>()?;
        memory.register_if_absent::<P::Output>()
    }

    async fn process(
        &self,
        context: &BuildContext,
        asset: Box<dyn AnyAsset>,
    ) -> Result<Box<dyn AnyAsset>, StageError> {
        let typed = asset
            .downcast::<P::Input>()
            .map_err(|other| StageError::UnexpectedInput {
                processor: self.0.identity().to_string(),
                expected: std::any::type_name::<P::Input>(),
                actual: other.value_type_name(),
            })?;
        Ok(self.0.process(context, typed).await?.boxed())
    }
}

/// Erase a processor's types.
pub fn erase<P: Processor>(processor: P) -> Box<dyn ErasedProcessor> {
    Box::new(Typed(processor))
}

/// Processors by input type, remembering registration order.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn ErasedProcessor>>,
    by_type: HashMap<TypeId, usize>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor. Replaces any processor for the same input type,
    /// keeping the original position.
    pub fn register(&mut self, processor: Box<dyn ErasedProcessor>) {
        let input = processor.input_type();
        match self.by_type.get(&input) {
            Some(&index) => self.processors[index] = processor,
            None => {
                self.by_type.insert(input, self.processors.len());
                self.processors.push(processor);
            }
        }
    }

    /// The processor for assets whose value type is `value_type`.
    pub fn get(&self, value_type: TypeId) -> Option<&dyn ErasedProcessor> {
        self.by_type
            .get(&value_type)
            .map(|&index| self.processors[index].as_ref())
    }

    /// Identities in registration order.
    pub fn identities(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.identity()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ErasedProcessor> {
        self.processors.iter().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
