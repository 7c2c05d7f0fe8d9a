use super::{Codegen, Handler, StaticHandler};
use crate::{
    info::TypeInfo,
    routine::{ReadFn, WriteFn},
    Error, Reflect, Serializer,
};
use bytes::{Buf, BufMut};
use std::{
    any::{Any, TypeId},
    collections::HashSet,
};

/// Custom handler that writes nothing for the listed types and reads them as their default
/// value.
///
/// Useful for fields that only make sense locally (caches, handles).
#[derive(Default)]
pub struct NoOpHandler {
    types: HashSet<TypeId>,
}

impl NoOpHandler {
    /// Creates a handler for the given types.
    pub fn new(types: impl IntoIterator<Item = TypeInfo>) -> Self {
        Self {
            types: types.into_iter().map(|info| info.id()).collect(),
        }
    }

    /// Adds `T` to the handled types.
    pub fn with<T: Reflect>(mut self) -> Self {
        self.types.insert(TypeId::of::<T>());
        self
    }
}

impl Handler for NoOpHandler {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn handles(&self, info: &TypeInfo) -> bool {
        self.types.contains(&info.id())
    }

    fn subtypes(&self, _: &TypeInfo) -> Vec<TypeInfo> {
        Vec::new()
    }

    fn codegen(&self) -> Codegen<'_> {
        Codegen::Static(self)
    }
}

impl StaticHandler for NoOpHandler {
    fn writer(&self, _: &TypeInfo) -> Result<WriteFn, Error> {
        Ok(Box::new(|_: &Serializer, _: &mut dyn BufMut, _: &dyn Any| Ok(())))
    }

    fn reader(&self, info: &TypeInfo) -> Result<ReadFn, Error> {
        let info = info.clone();
        Ok(Box::new(
            move |_: &Serializer, _: &mut dyn Buf, slot: &mut dyn Any| {
                info.reset(slot);
                Ok(())
            },
        ))
    }
}
