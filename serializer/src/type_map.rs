//! Explicit type to id assignments.

use crate::{info::TypeInfo, Error, Reflect};
use std::{any::TypeId, collections::HashMap, fmt};

/// A set of types with their assigned ids.
///
/// Returned by [crate::Serializer::add_types] and [crate::Serializer::type_map], and accepted by
/// [crate::Serializer::add_type_map] to reproduce an assignment exactly.
#[derive(Clone, Default)]
pub struct TypeMap {
    entries: HashMap<TypeId, (TypeInfo, u32)>,
}

impl TypeMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `id` to `T`.
    pub fn insert<T: Reflect>(&mut self, id: u32) -> Result<(), Error> {
        self.insert_info(T::type_info(), id)
    }

    /// Assigns `id` to the type described by `info`.
    ///
    /// Re-inserting a type with the same id is a no-op; with another id it is an error.
    pub fn insert_info(&mut self, info: TypeInfo, id: u32) -> Result<(), Error> {
        if let Some((existing, existing_id)) = self.entries.get(&info.id()) {
            if *existing_id == id {
                return Ok(());
            }
            return Err(Error::Configuration(format!(
                "type {} mapped to both {existing_id} and {id}",
                existing.name()
            )));
        }
        self.entries.insert(info.id(), (info, id));
        Ok(())
    }

    /// Returns the id assigned to `T`.
    pub fn get<T: Reflect>(&self) -> Option<u32> {
        self.get_by_type(TypeId::of::<T>())
    }

    /// Returns the id assigned to a type.
    pub fn get_by_type(&self, id: TypeId) -> Option<u32> {
        self.entries.get(&id).map(|(_, id)| *id)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = (&TypeInfo, u32)> {
        let mut entries: Vec<_> = self.entries.values().map(|(info, id)| (info, *id)).collect();
        entries.sort_by_key(|(_, id)| *id);
        entries.into_iter()
    }

    /// Adds the entries of `other`.
    ///
    /// Fails, leaving `self` unchanged, if a type is mapped to different ids or an id to
    /// different types.
    pub fn merge(&mut self, other: &TypeMap) -> Result<(), Error> {
        let ids: HashMap<u32, &TypeInfo> = self.iter().map(|(info, id)| (id, info)).collect();
        for (info, id) in other.iter() {
            if let Some(existing) = self.get_by_type(info.id()) {
                if existing != id {
                    return Err(Error::Configuration(format!(
                        "type {} mapped to both {existing} and {id}",
                        info.name()
                    )));
                }
            }
            if let Some(existing) = ids.get(&id) {
                if existing.id() != info.id() {
                    return Err(Error::Configuration(format!(
                        "id {id} mapped to both {} and {}",
                        existing.name(),
                        info.name()
                    )));
                }
            }
        }
        for (info, id) in other.iter() {
            self.entries.insert(info.id(), (info.clone(), id));
        }
        Ok(())
    }
}

impl fmt::Debug for TypeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(info, id)| (id, info.name())))
            .finish()
    }
}

impl PartialEq for TypeMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(info, id)| other.get_by_type(info.id()) == Some(id))
    }
}

impl Eq for TypeMap {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert() {
        let mut map = TypeMap::new();
        map.insert::<u32>(3).unwrap();
        map.insert::<String>(2).unwrap();
        map.insert::<u32>(3).unwrap();
        assert!(matches!(map.insert::<u32>(4), Err(Error::Configuration(_))));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get::<u32>(), Some(3));
        assert_eq!(map.get::<i32>(), None);
        let ids: Vec<_> = map.iter().map(|(_, id)| id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_merge() {
        let mut map = TypeMap::new();
        map.insert::<u32>(2).unwrap();

        let mut other = TypeMap::new();
        other.insert::<u32>(2).unwrap();
        other.insert::<String>(3).unwrap();
        map.merge(&other).unwrap();
        assert_eq!(map.get::<String>(), Some(3));

        let mut conflict = TypeMap::new();
        conflict.insert::<i64>(3).unwrap();
        conflict.insert::<bool>(4).unwrap();
        assert!(matches!(map.merge(&conflict), Err(Error::Configuration(_))));
        assert_eq!(map.get::<bool>(), None);

        let mut conflict = TypeMap::new();
        conflict.insert::<u32>(5).unwrap();
        assert!(matches!(map.merge(&conflict), Err(Error::Configuration(_))));
    }
}
