use super::{unsupported, Codegen, GeneratorHandler, Handler};
use crate::{
    engine::Generator,
    info::{Kind, TypeInfo},
    routine::{ReadFn, WriteFn},
    Error, Reflect, Serializer,
};
use bytes::{Buf, BufMut};
use std::any::Any;

/// Serializes optional values as a `bool` presence flag followed by the value, if any.
pub struct NullableHandler;

impl Handler for NullableHandler {
    fn name(&self) -> &'static str {
        "nullable"
    }

    fn handles(&self, info: &TypeInfo) -> bool {
        matches!(info.kind(), Kind::Nullable { .. })
    }

    fn subtypes(&self, info: &TypeInfo) -> Vec<TypeInfo> {
        match info.kind() {
            Kind::Nullable { inner, .. } => vec![bool::type_info(), inner()],
            _ => Vec::new(),
        }
    }

    fn codegen(&self) -> Codegen<'_> {
        Codegen::Generator(self)
    }
}

impl GeneratorHandler for NullableHandler {
    fn build_writer(&self, generator: &Generator<'_>, info: &TypeInfo) -> Result<WriteFn, Error> {
        let Kind::Nullable { inner, ops } = info.kind() else {
            return Err(unsupported(self, info));
        };
        let flag = generator.writer_call(&bool::type_info());
        let inner = generator.writer_call(&inner());
        let ops = ops.clone();
        Ok(Box::new(
            move |serializer: &Serializer, buf: &mut dyn BufMut, value: &dyn Any| {
                let value = ops.get(value)?;
                flag.write(serializer, buf, &value.is_some())?;
                match value {
                    Some(value) => inner.write(serializer, buf, value),
                    None => Ok(()),
                }
            },
        ))
    }

    fn build_reader(&self, generator: &Generator<'_>, info: &TypeInfo) -> Result<ReadFn, Error> {
        let Kind::Nullable { inner, ops } = info.kind() else {
            return Err(unsupported(self, info));
        };
        let flag = generator.reader_call(&bool::type_info());
        let inner = generator.reader_call(&inner());
        let ops = ops.clone();
        Ok(Box::new(
            move |serializer: &Serializer, buf: &mut dyn Buf, slot: &mut dyn Any| {
                let mut present = false;
                flag.read(serializer, buf, &mut present)?;
                ops.fill(slot, present, &mut |value: &mut dyn Any| {
                    inner.read(serializer, buf, value)
                })
            },
        ))
    }
}
