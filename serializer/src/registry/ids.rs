//! Id to descriptor table.
//!
//! A flat, power-of-two sized array indexed by id. Growing copies the slots into a larger array
//! and publishes it atomically.

use super::descriptor::TypeDescriptor;
use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::Arc;

/// Number of slots in the initial table.
const INITIAL_CAPACITY: usize = 256;

struct Slots(Vec<ArcSwapOption<TypeDescriptor>>);

impl Slots {
    fn with_len(len: usize) -> Self {
        Self((0..len).map(|_| ArcSwapOption::empty()).collect())
    }
}

/// Lock-free readable map from id to [TypeDescriptor].
///
/// Mutations must be serialized by the caller.
pub(crate) struct IdTable {
    slots: ArcSwap<Slots>,
}

impl IdTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: ArcSwap::from_pointee(Slots::with_len(INITIAL_CAPACITY)),
        }
    }

    pub(crate) fn get(&self, id: u32) -> Option<Arc<TypeDescriptor>> {
        let slots = self.slots.load();
        slots.0.get(id as usize)?.load_full()
    }

    pub(crate) fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.load().0.len()
    }

    /// Binds the descriptor's id, which must be unbound.
    pub(crate) fn insert(&self, descriptor: Arc<TypeDescriptor>) {
        let index = descriptor.id() as usize;
        let current = self.slots.load_full();
        if index < current.0.len() {
            current.0[index].store(Some(descriptor));
            return;
        }

        let grown = Slots::with_len((index + 1).next_power_of_two());
        for (old, new) in current.0.iter().zip(grown.0.iter()) {
            new.store(old.load_full());
        }
        grown.0[index].store(Some(descriptor));
        self.slots.store(Arc::new(grown));
    }

    /// Returns all descriptors ordered by id.
    pub(crate) fn descriptors(&self) -> Vec<Arc<TypeDescriptor>> {
        let slots = self.slots.load();
        slots.0.iter().filter_map(|slot| slot.load_full()).collect()
    }
}
