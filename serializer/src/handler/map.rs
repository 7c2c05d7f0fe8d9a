use super::{read_length, unsupported, write_length, Codegen, GeneratorHandler, Handler};
use crate::{
    engine::Generator,
    info::{Kind, TypeInfo},
    routine::{ReadFn, WriteFn},
    Error, Serializer,
};
use bytes::{Buf, BufMut};
use std::any::Any;

/// Serializes maps as `varint(len + 1)` followed by each key and value.
///
/// A length of `0` (null) decodes as an empty map.
pub struct MapHandler;

impl Handler for MapHandler {
    fn name(&self) -> &'static str {
        "map"
    }

    fn handles(&self, info: &TypeInfo) -> bool {
        matches!(info.kind(), Kind::Map { .. })
    }

    fn subtypes(&self, info: &TypeInfo) -> Vec<TypeInfo> {
        match info.kind() {
            Kind::Map { key, value, .. } => vec![key(), value()],
            _ => Vec::new(),
        }
    }

    fn codegen(&self) -> Codegen<'_> {
        Codegen::Generator(self)
    }
}

impl GeneratorHandler for MapHandler {
    fn build_writer(&self, generator: &Generator<'_>, info: &TypeInfo) -> Result<WriteFn, Error> {
        let Kind::Map { key, value, ops } = info.kind() else {
            return Err(unsupported(self, info));
        };
        let key = generator.writer_call(&key());
        let value = generator.writer_call(&value());
        let ops = ops.clone();
        let name = info.name();
        Ok(Box::new(
            move |serializer: &Serializer, buf: &mut dyn BufMut, map: &dyn Any| {
                let len = ops.len(map).ok_or(Error::TypeMismatch(name))?;
                write_length(name, len, buf)?;
                ops.for_each(map, &mut |k: &dyn Any, v: &dyn Any| {
                    key.write(serializer, buf, k)?;
                    value.write(serializer, buf, v)
                })
            },
        ))
    }

    fn build_reader(&self, generator: &Generator<'_>, info: &TypeInfo) -> Result<ReadFn, Error> {
        let Kind::Map { key, value, ops } = info.kind() else {
            return Err(unsupported(self, info));
        };
        let key = generator.reader_call(&key());
        let value = generator.reader_call(&value());
        let ops = ops.clone();
        Ok(Box::new(
            move |serializer: &Serializer, buf: &mut dyn Buf, slot: &mut dyn Any| {
                let len = read_length(buf)?;
                ops.fill(slot, len, &mut |k: &mut dyn Any, v: &mut dyn Any| {
                    key.read(serializer, buf, k)?;
                    value.read(serializer, buf, v)
                })
            },
        ))
    }
}
