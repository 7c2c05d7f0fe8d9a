//! Type registry
//!
//! Registered types are stored in two tables: one keyed by Rust type identity (used when
//! writing) and one keyed by assigned id (used when reading). Both are append-only and
//! readable without locking. All mutations go through a single [parking_lot::Mutex] per
//! registry; holding its guard (a `&mut State`) is required to insert.

mod descriptor;
mod ids;
mod types;

pub use descriptor::TypeDescriptor;

use crate::{handler::Handler, info::TypeInfo, Error};
use ids::IdTable;
use parking_lot::{Mutex, MutexGuard};
use std::{any::TypeId, sync::Arc};
use tracing::debug;
use types::TypeTable;

/// Id that is never bound: it encodes null on the wire.
pub const NULL_ID: u32 = 0;

/// Writer-side state, only accessible while holding the registry lock.
pub(crate) struct State {
    next_id: u32,
}

/// Append-only store of [TypeDescriptor]s.
pub struct Registry {
    types: TypeTable,
    ids: IdTable,
    state: Mutex<State>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            types: TypeTable::new(),
            ids: IdTable::new(),
            state: Mutex::new(State {
                next_id: NULL_ID + 1,
            }),
        }
    }

    /// Returns the descriptor of a type.
    pub fn get(&self, id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.types.get(&id)
    }

    /// Returns the descriptor bound to an id.
    pub fn get_by_id(&self, id: u32) -> Option<Arc<TypeDescriptor>> {
        self.ids.get(id)
    }

    /// Returns whether a type is registered.
    pub fn contains(&self, id: TypeId) -> bool {
        self.types.contains(&id)
    }

    /// Returns whether an id is bound.
    pub fn contains_id(&self, id: u32) -> bool {
        self.ids.contains(id)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all descriptors ordered by id.
    pub fn descriptors(&self) -> Vec<Arc<TypeDescriptor>> {
        self.ids.descriptors()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Returns the next id not bound yet.
    pub(crate) fn allocate_id(&self, state: &mut State) -> Result<u32, Error> {
        while self.ids.contains(state.next_id) {
            state.next_id = next(state.next_id)?;
        }
        let id = state.next_id;
        state.next_id = next(id)?;
        Ok(id)
    }

    /// Binds `info` to `id`.
    ///
    /// Fails if the id is reserved or bound, or if the type is already registered.
    pub(crate) fn insert(
        &self,
        _state: &mut State,
        id: u32,
        info: TypeInfo,
        handler: Arc<dyn Handler>,
    ) -> Result<Arc<TypeDescriptor>, Error> {
        if id == NULL_ID {
            return Err(Error::Configuration(format!(
                "type id {NULL_ID} is reserved ({})",
                info.name()
            )));
        }
        if let Some(existing) = self.types.get(&info.id()) {
            return Err(Error::Configuration(format!(
                "type {} already registered with id {}",
                info.name(),
                existing.id()
            )));
        }
        if let Some(existing) = self.ids.get(id) {
            return Err(Error::Configuration(format!(
                "type id {id} already bound to {}",
                existing.name()
            )));
        }

        let descriptor = Arc::new(TypeDescriptor::new(id, info, handler));

        // Publish the id first so that a type is never writable before it is readable.
        self.ids.insert(descriptor.clone());
        self.types.insert(descriptor.clone());
        debug!(
            id,
            name = descriptor.name(),
            handler = descriptor.handler().name(),
            direct = descriptor.is_direct(),
            "registered type"
        );
        Ok(descriptor)
    }
}

fn next(id: u32) -> Result<u32, Error> {
    id.checked_add(1)
        .ok_or_else(|| Error::Configuration("type ids exhausted".to_string()))
}
