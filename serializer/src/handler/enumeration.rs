use super::{unsupported, Codegen, Handler, StaticHandler};
use crate::{
    info::{Kind, TypeInfo},
    routine::{ReadFn, WriteFn},
    Error, Serializer,
};
use bytes::{Buf, BufMut};
use std::any::Any;

/// Serializes C-like enumerations as their leaf representation.
pub struct EnumHandler;

impl Handler for EnumHandler {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn handles(&self, info: &TypeInfo) -> bool {
        matches!(info.kind(), Kind::Enum(_))
    }

    fn subtypes(&self, _: &TypeInfo) -> Vec<TypeInfo> {
        Vec::new()
    }

    fn codegen(&self) -> Codegen<'_> {
        Codegen::Static(self)
    }
}

impl StaticHandler for EnumHandler {
    fn writer(&self, info: &TypeInfo) -> Result<WriteFn, Error> {
        let Kind::Enum(ops) = info.kind() else {
            return Err(unsupported(self, info));
        };
        let ops = ops.clone();
        Ok(Box::new(
            move |_: &Serializer, buf: &mut dyn BufMut, value: &dyn Any| ops.write(value, buf),
        ))
    }

    fn reader(&self, info: &TypeInfo) -> Result<ReadFn, Error> {
        let Kind::Enum(ops) = info.kind() else {
            return Err(unsupported(self, info));
        };
        let ops = ops.clone();
        Ok(Box::new(
            move |_: &Serializer, buf: &mut dyn Buf, slot: &mut dyn Any| ops.read(buf, slot),
        ))
    }
}
