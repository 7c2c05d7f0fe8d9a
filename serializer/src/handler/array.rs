use super::{read_length, unsupported, write_length, Codegen, GeneratorHandler, Handler};
use crate::{
    engine::Generator,
    info::{Kind, TypeInfo},
    routine::{ReadFn, WriteFn},
    Error, Serializer,
};
use bytes::{Buf, BufMut};
use std::any::Any;

/// Serializes sequences as `varint(len + 1)` followed by each element.
///
/// A length of `0` (null) decodes as an empty sequence.
pub struct ArrayHandler;

impl Handler for ArrayHandler {
    fn name(&self) -> &'static str {
        "array"
    }

    fn handles(&self, info: &TypeInfo) -> bool {
        matches!(info.kind(), Kind::Array { .. })
    }

    fn subtypes(&self, info: &TypeInfo) -> Vec<TypeInfo> {
        match info.kind() {
            Kind::Array { element, .. } => vec![element()],
            _ => Vec::new(),
        }
    }

    fn codegen(&self) -> Codegen<'_> {
        Codegen::Generator(self)
    }
}

impl GeneratorHandler for ArrayHandler {
    fn build_writer(&self, generator: &Generator<'_>, info: &TypeInfo) -> Result<WriteFn, Error> {
        let Kind::Array { element, ops } = info.kind() else {
            return Err(unsupported(self, info));
        };
        let element = generator.writer_call(&element());
        let ops = ops.clone();
        let name = info.name();
        Ok(Box::new(
            move |serializer: &Serializer, buf: &mut dyn BufMut, value: &dyn Any| {
                let len = ops.len(value).ok_or(Error::TypeMismatch(name))?;
                write_length(name, len, buf)?;
                ops.for_each(value, &mut |item: &dyn Any| {
                    element.write(serializer, buf, item)
                })
            },
        ))
    }

    fn build_reader(&self, generator: &Generator<'_>, info: &TypeInfo) -> Result<ReadFn, Error> {
        let Kind::Array { element, ops } = info.kind() else {
            return Err(unsupported(self, info));
        };
        let element = generator.reader_call(&element());
        let ops = ops.clone();
        Ok(Box::new(
            move |serializer: &Serializer, buf: &mut dyn Buf, slot: &mut dyn Any| {
                let len = read_length(buf)?;

                // Every element takes at least one byte (unless zero-sized), so never reserve
                // more than what remains.
                let capacity = len.min(buf.remaining());
                ops.fill(slot, len, capacity, &mut |item: &mut dyn Any| {
                    element.read(serializer, buf, item)
                })
            },
        ))
    }
}
