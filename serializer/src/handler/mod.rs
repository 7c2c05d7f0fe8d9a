//! Type handlers
//!
//! A [Handler] classifies types, lists the types its routines depend on, and supplies the
//! routines themselves. Handlers come in two flavors (see [Codegen]):
//!
//! - _Static_ handlers ([StaticHandler]) supply ready-made routines for a type. They are used
//!   for leaf types (primitives, enums).
//! - _Generator_ handlers ([GeneratorHandler]) build a routine body from the call targets of
//!   the types it depends on. They run after stubs exist for every type in the closure, so a
//!   body may reference any routine (including its own).
//!
//! Custom handlers from [crate::Config] are consulted first, in order, then the built-ins:
//! [DynamicHandler], [PrimitiveHandler], [ArrayHandler], [EnumHandler], [MapHandler],
//! [NullableHandler] and [CompositeHandler]. The first handler that claims a type wins.

mod array;
mod composite;
mod dynamic;
mod enumeration;
mod map;
mod noop;
mod nullable;
mod primitive;

pub use array::ArrayHandler;
pub use composite::CompositeHandler;
pub use dynamic::DynamicHandler;
pub use enumeration::EnumHandler;
pub use map::MapHandler;
pub use noop::NoOpHandler;
pub use nullable::NullableHandler;
pub use primitive::PrimitiveHandler;

use crate::{
    config::Config,
    engine::Generator,
    info::TypeInfo,
    routine::{ReadFn, WriteFn},
    varint, Error,
};
use bytes::{Buf, BufMut};
use std::sync::Arc;

/// Serialization strategy for a family of types.
pub trait Handler: Send + Sync {
    /// Returns a short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Returns whether the handler serializes `info`.
    fn handles(&self, info: &TypeInfo) -> bool;

    /// Returns the types the routines of `info` call into.
    fn subtypes(&self, info: &TypeInfo) -> Vec<TypeInfo>;

    /// Checks, at registration time, that `info` can be serialized under `config`.
    fn validate(&self, _info: &TypeInfo, _config: &Config) -> Result<(), Error> {
        Ok(())
    }

    /// Returns how the handler produces routines.
    fn codegen(&self) -> Codegen<'_>;
}

/// The routine-producing capability of a [Handler].
pub enum Codegen<'a> {
    /// Ready-made routines, bound when stubs are created.
    Static(&'a dyn StaticHandler),
    /// Routine bodies built once stubs exist for the whole closure.
    Generator(&'a dyn GeneratorHandler),
}

/// Supplies ready-made routines.
pub trait StaticHandler: Send + Sync {
    /// Returns the write routine of `info`.
    fn writer(&self, info: &TypeInfo) -> Result<WriteFn, Error>;

    /// Returns the read routine of `info`.
    fn reader(&self, info: &TypeInfo) -> Result<ReadFn, Error>;
}

/// Builds routine bodies from the call targets of other types.
pub trait GeneratorHandler: Send + Sync {
    /// Builds the write routine body of `info`.
    fn build_writer(&self, generator: &Generator<'_>, info: &TypeInfo) -> Result<WriteFn, Error>;

    /// Builds the read routine body of `info`.
    fn build_reader(&self, generator: &Generator<'_>, info: &TypeInfo) -> Result<ReadFn, Error>;
}

/// Returns the built-in handlers in resolution order.
pub fn builtins() -> Vec<Arc<dyn Handler>> {
    vec![
        Arc::new(DynamicHandler),
        Arc::new(PrimitiveHandler),
        Arc::new(ArrayHandler),
        Arc::new(EnumHandler),
        Arc::new(MapHandler),
        Arc::new(NullableHandler),
        Arc::new(CompositeHandler),
    ]
}

/// Offset added to collection lengths: `0` is reserved for null.
const LENGTH_OFFSET: u32 = 1;

/// Writes a collection length.
pub(crate) fn write_length(
    context: &'static str,
    len: usize,
    buf: &mut dyn BufMut,
) -> Result<(), Error> {
    let field = u32::try_from(len)
        .ok()
        .and_then(|len| len.checked_add(LENGTH_OFFSET))
        .ok_or_else(|| Error::InvalidData(context, format!("length {len} too large")))?;
    varint::write(field, buf);
    Ok(())
}

/// Reads a collection length. Null decodes as empty.
pub(crate) fn read_length(buf: &mut dyn Buf) -> Result<usize, Error> {
    let field: u32 = varint::read(buf)?;
    Ok(field.saturating_sub(LENGTH_OFFSET) as usize)
}

/// Error for a type passed to a handler that does not claim it.
pub(crate) fn unsupported(handler: &dyn Handler, info: &TypeInfo) -> Error {
    Error::Configuration(format!(
        "{} handler cannot serialize {} ({:?})",
        handler.name(),
        info.name(),
        info.kind()
    ))
}
