//! Polymorphic envelope
//!
//! Slots whose concrete type is not known statically are written as `varint(id)` followed by
//! the payload of the registered type bound to `id`. An id of `0` encodes null and carries no
//! payload.

use crate::{
    dynamic::Dynamic,
    info::{Kind, TypeInfo},
    registry::NULL_ID,
    varint, Error, Serializer,
};
use bytes::{Buf, BufMut};
use std::any::Any;
use tracing::trace;

type Boxed = Box<dyn Any + Send + Sync>;

/// Writes a value declared as `declared`.
///
/// [Dynamic] and interface slots are unwrapped first; an empty slot is written as null.
pub(crate) fn write(
    serializer: &Serializer,
    buf: &mut dyn BufMut,
    declared: &TypeInfo,
    value: &dyn Any,
) -> Result<(), Error> {
    match declared.kind() {
        Kind::Dynamic => {
            let value = value
                .downcast_ref::<Dynamic>()
                .ok_or(Error::TypeMismatch(declared.name()))?;
            write_dynamic(serializer, buf, value)
        }
        Kind::Interface(accessor) => {
            let value = accessor
                .get(value)
                .and_then(|value| value.downcast_ref::<Dynamic>())
                .ok_or(Error::TypeMismatch(declared.name()))?;
            write_dynamic(serializer, buf, value)
        }
        _ => write_value(serializer, buf, value, declared.name()),
    }
}

/// Writes the content of a [Dynamic] slot.
pub(crate) fn write_dynamic(
    serializer: &Serializer,
    buf: &mut dyn BufMut,
    value: &Dynamic,
) -> Result<(), Error> {
    match (value.value(), value.type_name()) {
        (Some(inner), Some(name)) => write_value(serializer, buf, inner, name),
        _ => {
            varint::write(NULL_ID, buf);
            Ok(())
        }
    }
}

/// Writes the id of the runtime type of `value`, then its payload.
pub(crate) fn write_value(
    serializer: &Serializer,
    buf: &mut dyn BufMut,
    value: &dyn Any,
    name: &'static str,
) -> Result<(), Error> {
    let descriptor = serializer
        .registry()
        .get(value.type_id())
        .ok_or_else(|| Error::UnregisteredType(name.to_string()))?;
    let writer = serializer.indirect_writer(&descriptor)?;
    varint::write(descriptor.id(), buf);
    writer.write(serializer, buf, value)
}

/// Reads an envelope into `slot`, a value declared as `declared`.
///
/// Null resets the slot to its default value (or empties a [Dynamic] / interface slot).
pub(crate) fn read(
    serializer: &Serializer,
    buf: &mut dyn Buf,
    declared: &TypeInfo,
    slot: &mut dyn Any,
) -> Result<(), Error> {
    let value = read_value(serializer, buf)?;
    match declared.kind() {
        Kind::Dynamic => {
            let slot = slot
                .downcast_mut::<Dynamic>()
                .ok_or(Error::TypeMismatch(declared.name()))?;
            *slot = into_dynamic(value);
            Ok(())
        }
        Kind::Interface(accessor) => {
            let slot = accessor
                .get_mut(slot)
                .and_then(|slot| slot.downcast_mut::<Dynamic>())
                .ok_or(Error::TypeMismatch(declared.name()))?;
            *slot = into_dynamic(value);
            Ok(())
        }
        _ => match value {
            Some((value, _)) => declared.assign(slot, value),
            None => {
                declared.reset(slot);
                Ok(())
            }
        },
    }
}

/// Reads an envelope into a [Dynamic].
pub(crate) fn read_dynamic(serializer: &Serializer, buf: &mut dyn Buf) -> Result<Dynamic, Error> {
    read_value(serializer, buf).map(into_dynamic)
}

/// Reads an id and, unless null, the payload of the type bound to it.
fn read_value(
    serializer: &Serializer,
    buf: &mut dyn Buf,
) -> Result<Option<(Boxed, &'static str)>, Error> {
    let id: u32 = varint::read(buf)?;
    if id == NULL_ID {
        return Ok(None);
    }
    let Some(descriptor) = serializer.registry().get_by_id(id) else {
        trace!(id, remaining = buf.remaining(), "unknown type id");
        return Err(Error::UnknownTypeId(id));
    };
    let reader = serializer.indirect_reader(&descriptor)?;
    let value = reader.read(serializer, buf)?;
    Ok(Some((value, descriptor.name())))
}

fn into_dynamic(value: Option<(Boxed, &'static str)>) -> Dynamic {
    match value {
        Some((value, name)) => Dynamic::from_boxed(value, name),
        None => Dynamic::null(),
    }
}
