//! Serializers keyed by root type.

use crate::{config::Config, Error, Reflect, Serializer};
use bytes::{Buf, BufMut, BytesMut};
use dashmap::DashMap;
use std::{any::TypeId, marker::PhantomData, sync::Arc};
use tracing::debug;

/// A cache of serializers, one per root type, all sharing the same [Config].
///
/// Lookups are concurrent. When two threads construct the serializer of the same root at the
/// same time, both succeed and the last one stored is kept (serializers built from the same
/// root are interchangeable).
#[derive(Default)]
pub struct SerializerCache {
    config: Config,
    serializers: DashMap<TypeId, Arc<Serializer>>,
}

impl SerializerCache {
    /// Creates an empty cache.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            serializers: DashMap::new(),
        }
    }

    /// Returns the serializer rooted at `T`, constructing it if needed.
    pub fn get<T: Reflect>(&self) -> Result<Arc<Serializer>, Error> {
        let key = TypeId::of::<T>();
        if let Some(serializer) = self.serializers.get(&key) {
            return Ok(serializer.value().clone());
        }

        // Construct without holding a shard lock.
        let serializer = Arc::new(Serializer::with_config(
            self.config.clone(),
            [T::type_info()],
        )?);
        self.serializers.insert(key, serializer.clone());
        debug!(root = std::any::type_name::<T>(), "cached serializer");
        Ok(serializer)
    }

    /// Returns a serializer of `T` values that never writes an envelope.
    pub fn typed<T: Reflect>(&self) -> Result<TypedSerializer<T>, Error> {
        Ok(TypedSerializer::new(self.get::<T>()?))
    }

    /// Returns the number of cached serializers.
    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }
}

/// A [Serializer] restricted to values of `T`, written without an envelope.
pub struct TypedSerializer<T> {
    serializer: Arc<Serializer>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedSerializer<T> {
    fn clone(&self) -> Self {
        Self {
            serializer: self.serializer.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Reflect> TypedSerializer<T> {
    /// Wraps `serializer`, which should have `T` registered.
    pub fn new(serializer: Arc<Serializer>) -> Self {
        Self {
            serializer,
            _marker: PhantomData,
        }
    }

    /// Returns the underlying serializer.
    pub fn serializer(&self) -> &Arc<Serializer> {
        &self.serializer
    }

    /// Writes `value`.
    pub fn serialize(&self, buf: &mut impl BufMut, value: &T) -> Result<(), Error> {
        self.serializer.serialize_direct(buf, value)
    }

    /// Reads a value.
    pub fn deserialize(&self, buf: &mut impl Buf) -> Result<T, Error> {
        self.serializer.deserialize_direct(buf)
    }

    /// Encodes `value`.
    pub fn encode(&self, value: &T) -> Result<BytesMut, Error> {
        self.serializer.encode_direct(value)
    }

    /// Decodes a value, ensuring `buf` is fully consumed.
    pub fn decode(&self, buf: impl Buf) -> Result<T, Error> {
        self.serializer.decode_direct(buf)
    }
}
