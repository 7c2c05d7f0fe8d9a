//! Type descriptions for standard types.

use crate::{
    info::{MapOps, NullableOps, SequenceOps, TypeInfo},
    primitives::Decimal,
    Dynamic, Error,
};
use bytes::Bytes;
use std::{
    any::{type_name, Any},
    collections::{BTreeMap, HashMap},
    hash::Hash,
    marker::PhantomData,
};

/// A type that can be registered with a [crate::Serializer].
///
/// Implementations describe the shape of the type with a [TypeInfo]. Values are created with
/// [Default] before they are populated during decoding.
pub trait Reflect: Any + Default + Send + Sync {
    /// Returns the description of the type.
    fn type_info() -> TypeInfo;
}

macro_rules! impl_primitive {
    ($($type:ty),* $(,)?) => {
        $(
            impl Reflect for $type {
                fn type_info() -> TypeInfo {
                    TypeInfo::primitive::<Self>()
                }
            }
        )*
    };
}
impl_primitive!(bool, u8, i8, char, u16, i16, u32, i32, u64, i64, f32, f64);
impl_primitive!(String, Decimal, Bytes);

impl Reflect for Dynamic {
    fn type_info() -> TypeInfo {
        TypeInfo::dynamic()
    }
}

fn mismatch<T>() -> Error {
    Error::TypeMismatch(type_name::<T>())
}

struct VecOps<T>(PhantomData<fn() -> T>);

impl<T: Reflect> SequenceOps for VecOps<T> {
    fn len(&self, value: &dyn Any) -> Option<usize> {
        value.downcast_ref::<Vec<T>>().map(Vec::len)
    }

    fn for_each(
        &self,
        value: &dyn Any,
        visit: &mut dyn FnMut(&dyn Any) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let items = value
            .downcast_ref::<Vec<T>>()
            .ok_or_else(mismatch::<Vec<T>>)?;
        for item in items {
            visit(item as &dyn Any)?;
        }
        Ok(())
    }

    fn fill(
        &self,
        slot: &mut dyn Any,
        len: usize,
        capacity: usize,
        read: &mut dyn FnMut(&mut dyn Any) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let items = slot
            .downcast_mut::<Vec<T>>()
            .ok_or_else(mismatch::<Vec<T>>)?;
        items.clear();
        items.reserve(capacity);
        for _ in 0..len {
            let mut item = T::default();
            read(&mut item as &mut dyn Any)?;
            items.push(item);
        }
        Ok(())
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::array::<Self, T>(VecOps::<T>(PhantomData))
    }
}

struct OptionOps<T>(PhantomData<fn() -> T>);

impl<T: Reflect> NullableOps for OptionOps<T> {
    fn get<'a>(&self, value: &'a dyn Any) -> Result<Option<&'a dyn Any>, Error> {
        let value = value
            .downcast_ref::<Option<T>>()
            .ok_or_else(mismatch::<Option<T>>)?;
        Ok(value.as_ref().map(|inner| inner as &dyn Any))
    }

    fn fill(
        &self,
        slot: &mut dyn Any,
        present: bool,
        read: &mut dyn FnMut(&mut dyn Any) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let slot = slot
            .downcast_mut::<Option<T>>()
            .ok_or_else(mismatch::<Option<T>>)?;
        if !present {
            *slot = None;
            return Ok(());
        }
        let mut inner = T::default();
        read(&mut inner as &mut dyn Any)?;
        *slot = Some(inner);
        Ok(())
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::nullable::<Self, T>(OptionOps::<T>(PhantomData))
    }
}

// Shared by the map implementations.
trait Entries<K: 'static, V: 'static>: Any + Default {
    fn entries(&self) -> impl Iterator<Item = (&K, &V)>;
    fn count(&self) -> usize;
    fn put(&mut self, key: K, value: V);
}

impl<K: Eq + Hash + 'static, V: 'static> Entries<K, V> for HashMap<K, V> {
    fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.iter()
    }

    fn count(&self) -> usize {
        self.len()
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K: Ord + 'static, V: 'static> Entries<K, V> for BTreeMap<K, V> {
    fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.iter()
    }

    fn count(&self) -> usize {
        self.len()
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

struct EntriesOps<M, K, V>(PhantomData<fn() -> (M, K, V)>);

impl<M, K, V> MapOps for EntriesOps<M, K, V>
where
    M: Entries<K, V>,
    K: Reflect,
    V: Reflect,
{
    fn len(&self, value: &dyn Any) -> Option<usize> {
        value.downcast_ref::<M>().map(Entries::count)
    }

    fn for_each(
        &self,
        value: &dyn Any,
        visit: &mut dyn FnMut(&dyn Any, &dyn Any) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let map = value.downcast_ref::<M>().ok_or_else(mismatch::<M>)?;
        for (key, value) in map.entries() {
            visit(key as &dyn Any, value as &dyn Any)?;
        }
        Ok(())
    }

    fn fill(
        &self,
        slot: &mut dyn Any,
        len: usize,
        read: &mut dyn FnMut(&mut dyn Any, &mut dyn Any) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let map = slot.downcast_mut::<M>().ok_or_else(mismatch::<M>)?;
        *map = M::default();
        for _ in 0..len {
            let mut key = K::default();
            let mut value = V::default();
            read(&mut key as &mut dyn Any, &mut value as &mut dyn Any)?;
            map.put(key, value);
        }
        Ok(())
    }
}

impl<K: Reflect + Eq + Hash, V: Reflect> Reflect for HashMap<K, V> {
    fn type_info() -> TypeInfo {
        TypeInfo::map::<Self, K, V>(EntriesOps::<Self, K, V>(PhantomData))
    }
}

impl<K: Reflect + Ord, V: Reflect> Reflect for BTreeMap<K, V> {
    fn type_info() -> TypeInfo {
        TypeInfo::map::<Self, K, V>(EntriesOps::<Self, K, V>(PhantomData))
    }
}
