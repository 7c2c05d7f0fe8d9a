use super::{Codegen, Handler, StaticHandler};
use crate::{
    envelope,
    info::{Kind, TypeInfo},
    routine::{ReadFn, WriteFn},
    Dynamic, Error, Serializer,
};
use bytes::{Buf, BufMut};
use std::any::{type_name, Any};

fn write_dynamic(
    serializer: &Serializer,
    buf: &mut dyn BufMut,
    value: &dyn Any,
) -> Result<(), Error> {
    let value = value
        .downcast_ref::<Dynamic>()
        .ok_or(Error::TypeMismatch(type_name::<Dynamic>()))?;
    envelope::write_dynamic(serializer, buf, value)
}

fn read_dynamic(
    serializer: &Serializer,
    buf: &mut dyn Buf,
    slot: &mut dyn Any,
) -> Result<(), Error> {
    let slot = slot
        .downcast_mut::<Dynamic>()
        .ok_or(Error::TypeMismatch(type_name::<Dynamic>()))?;
    *slot = envelope::read_dynamic(serializer, buf)?;
    Ok(())
}

/// Serializes a [Dynamic] held as a value: its payload is a nested envelope.
pub struct DynamicHandler;

impl Handler for DynamicHandler {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn handles(&self, info: &TypeInfo) -> bool {
        matches!(info.kind(), Kind::Dynamic)
    }

    fn subtypes(&self, _: &TypeInfo) -> Vec<TypeInfo> {
        Vec::new()
    }

    fn codegen(&self) -> Codegen<'_> {
        Codegen::Static(self)
    }
}

impl StaticHandler for DynamicHandler {
    fn writer(&self, _: &TypeInfo) -> Result<WriteFn, Error> {
        Ok(Box::new(write_dynamic))
    }

    fn reader(&self, _: &TypeInfo) -> Result<ReadFn, Error> {
        Ok(Box::new(read_dynamic))
    }
}
