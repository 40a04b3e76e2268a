//! Assets: typed values produced by importers and processors.
//!
//! The value type of an asset is open-ended: any serializable, thread-safe
//! type can be an asset value. Stages exchange assets type-erased as
//! `Box<dyn AnyAsset>` and recover the concrete type by downcasting on the
//! value's `TypeId`.

use crate::configuration::AssetConfiguration;
use crate::error::{AssetError, Error};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

/// Marker for types that can be carried as asset values.
pub trait AssetValue: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> AssetValue for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A materialized asset. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset<T> {
    identifier: String,
    configuration: AssetConfiguration,
    value: T,
}

impl<T: AssetValue> Asset<T> {
    pub fn new(identifier: impl Into<String>, configuration: AssetConfiguration, value: T) -> Self {
        Self {
            identifier: identifier.into(),
            configuration,
            value,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn configuration(&self) -> &AssetConfiguration {
        &self.configuration
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Build a new asset with the same identity but a different value.
    pub fn map<U: AssetValue>(self, f: impl FnOnce(T) -> U) -> Asset<U> {
        Asset {
            identifier: self.identifier,
            configuration: self.configuration,
            value: f(self.value),
        }
    }

    pub fn boxed(self) -> Box<dyn AnyAsset> {
        Box::new(self)
    }
}

/// Type-erased view of an [`Asset`].
pub trait AnyAsset: Send + Sync {
    fn identifier(&self) -> &str;

    fn configuration(&self) -> &AssetConfiguration;

    /// `TypeId` of the concrete value type.
    fn value_type(&self) -> TypeId;

    /// Human-readable name of the concrete value type.
    fn value_type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;

    /// Serializer for this asset's value type.
    fn codec(&self) -> Arc<dyn ValueCodec>;
}

impl<T: AssetValue> AnyAsset for Asset<T> {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn configuration(&self) -> &AssetConfiguration {
        &self.configuration
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn value_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn codec(&self) -> Arc<dyn ValueCodec> {
        Arc::new(JsonCodec::<T>::new())
    }
}

impl<'a> dyn AnyAsset + 'a {
    pub fn is<T: AssetValue>(&self) -> bool {
        self.value_type() == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: AssetValue>(&self) -> Option<&Asset<T>> {
        self.as_any().downcast_ref::<Asset<T>>()
    }
}

impl dyn AnyAsset {

    /// Recover the typed asset, handing the box back unchanged on mismatch.
    pub fn downcast<T: AssetValue>(self: Box<Self>) -> Result<Asset<T>, Box<dyn AnyAsset>> {
        if !self.is::<T>() {
            return Err(self);
        }
        match self.into_any().downcast::<Asset<T>>() {
            Ok(asset) => Ok(*asset),
            // value_type() agreed with T, so into_any() must hold Asset<T>
            Err(_) => unreachable!("asset value type changed during downcast"),
        }
    }
}

impl std::fmt::Debug for dyn AnyAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyAsset")
            .field("identifier", &self.identifier())
            .field("value_type", &self.value_type_name())
            .finish()
    }
}

/// Converts asset values of one concrete type to and from bytes.
///
/// The memory manager holds one codec per registered value type so it can
/// store and revive values it only ever sees type-erased.
pub trait ValueCodec: Send + Sync {
    fn value_type(&self) -> TypeId;

    fn type_name(&self) -> &'static str;

    /// Serialize the value of `asset`. Fails if the asset holds another type.
    fn encode(&self, asset: &dyn AnyAsset) -> Result<Vec<u8>, Error>;

    fn decode(&self, bytes: &[u8]) -> Result<Arc<dyn Any + Send + Sync>, serde_json::Error>;
}

/// JSON encoding of a value type.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T: AssetValue> JsonCodec<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: AssetValue> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AssetValue> ValueCodec for JsonCodec<T> {
    fn value_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn encode(&self, asset: &dyn AnyAsset) -> Result<Vec<u8>, Error> {
        let typed = asset
            .downcast_ref::<T>()
            .ok_or_else(|| AssetError::TypeMismatch {
                identifier: asset.identifier().to_string(),
                expected: std::any::type_name::<T>(),
                actual: asset.value_type_name().to_string(),
            })?;
        Ok(serde_json::to_vec(typed.value())?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Arc<dyn Any + Send + Sync>, serde_json::Error> {
        let value: T = serde_json::from_slice(bytes)?;
        Ok(Arc::new(value))
    }
}
