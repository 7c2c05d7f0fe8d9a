//! Type identity to descriptor table.
//!
//! A bucketed hash table. Each bucket is an immutable list that writers replace wholesale; the
//! bucket array itself is replaced when the table grows. Readers load the current snapshots
//! without locking and observe either the old or the new contents, never a partial update.

use super::descriptor::TypeDescriptor;
use arc_swap::{ArcSwap, ArcSwapOption};
use std::{
    any::TypeId,
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Number of entries the initial table holds before it grows.
const INITIAL_CAPACITY: usize = 256;

type Bucket = ArcSwapOption<Vec<Arc<TypeDescriptor>>>;

struct Buckets(Vec<Bucket>);

impl Buckets {
    fn with_len(len: usize) -> Self {
        Self((0..len).map(|_| Bucket::empty()).collect())
    }

    fn index(&self, id: &TypeId) -> usize {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        (hasher.finish() as usize) & (self.0.len() - 1)
    }

    fn bucket(&self, id: &TypeId) -> &Bucket {
        &self.0[self.index(id)]
    }

    fn push(&self, descriptor: Arc<TypeDescriptor>) {
        let bucket = self.bucket(&descriptor.info().id());
        let mut items: Vec<_> = bucket
            .load_full()
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default();
        items.push(descriptor);
        bucket.store(Some(Arc::new(items)));
    }
}

/// Lock-free readable map from [TypeId] to [TypeDescriptor].
///
/// Mutations must be serialized by the caller.
pub(crate) struct TypeTable {
    buckets: ArcSwap<Buckets>,
    len: AtomicUsize,
}

impl TypeTable {
    pub(crate) fn new() -> Self {
        // Load factor 0.5
        Self {
            buckets: ArcSwap::from_pointee(Buckets::with_len(INITIAL_CAPACITY * 2)),
            len: AtomicUsize::new(0),
        }
    }

    pub(crate) fn get(&self, id: &TypeId) -> Option<Arc<TypeDescriptor>> {
        let buckets = self.buckets.load();
        let bucket = buckets.bucket(id).load_full()?;
        bucket
            .iter()
            .find(|descriptor| descriptor.info().id() == *id)
            .cloned()
    }

    pub(crate) fn contains(&self, id: &TypeId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.load().0.len()
    }

    /// Inserts a descriptor for a type that is not yet present.
    pub(crate) fn insert(&self, descriptor: Arc<TypeDescriptor>) {
        let len = self.len() + 1;
        let current = self.buckets.load_full();
        if len * 2 > current.0.len() {
            // Rebuild at double size off to the side, then publish.
            let grown = Buckets::with_len(current.0.len() * 2);
            for bucket in &current.0 {
                if let Some(items) = bucket.load_full() {
                    for item in items.iter() {
                        grown.push(item.clone());
                    }
                }
            }
            grown.push(descriptor);
            self.buckets.store(Arc::new(grown));
        } else {
            current.push(descriptor);
        }
        self.len.store(len, Ordering::Release);
    }

    pub(crate) fn descriptors(&self) -> Vec<Arc<TypeDescriptor>> {
        let buckets = self.buckets.load();
        buckets
            .0
            .iter()
            .filter_map(|bucket| bucket.load_full())
            .flat_map(|items| items.iter().cloned().collect::<Vec<_>>())
            .collect()
    }
}
