use super::{unsupported, Codegen, GeneratorHandler, Handler};
use crate::{
    config::Config,
    engine::Generator,
    info::{Composite, Field, Hooks, Kind, TypeInfo},
    routine::{ReadCall, ReadFn, WriteCall, WriteFn},
    Error, Serializer,
};
use bytes::{Buf, BufMut};
use std::any::Any;

/// Serializes composites as their fields in order (base fields first), with optional
/// lifecycle hooks.
///
/// When decoding, composites that are not value types are reset to their default value before
/// any field is read.
pub struct CompositeHandler;

fn composite<'a>(handler: &CompositeHandler, info: &'a TypeInfo) -> Result<&'a Composite, Error> {
    match info.kind() {
        Kind::Composite(composite) => Ok(composite),
        _ => Err(unsupported(handler, info)),
    }
}

fn hooks(generator: &Generator<'_>, composite: &Composite) -> Hooks {
    if generator.config().callbacks {
        composite.hooks().clone()
    } else {
        Hooks::default()
    }
}

impl Handler for CompositeHandler {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn handles(&self, info: &TypeInfo) -> bool {
        matches!(info.kind(), Kind::Composite(_))
    }

    fn subtypes(&self, info: &TypeInfo) -> Vec<TypeInfo> {
        match info.kind() {
            Kind::Composite(composite) => composite.fields().iter().map(Field::declared).collect(),
            _ => Vec::new(),
        }
    }

    fn validate(&self, info: &TypeInfo, config: &Config) -> Result<(), Error> {
        let composite = composite(self, info)?;
        if let Some(base) = composite.base() {
            if !matches!(base.kind(), Kind::Composite(_)) {
                return Err(Error::Configuration(format!(
                    "base {} of {} is not a composite",
                    base.name(),
                    info.name()
                )));
            }
        }
        if config.callbacks && info.is_value_type() && !composite.hooks().is_empty() {
            return Err(Error::Configuration(format!(
                "lifecycle hooks are not supported on value type {}",
                info.name()
            )));
        }
        Ok(())
    }

    fn codegen(&self) -> Codegen<'_> {
        Codegen::Generator(self)
    }
}

impl GeneratorHandler for CompositeHandler {
    fn build_writer(&self, generator: &Generator<'_>, info: &TypeInfo) -> Result<WriteFn, Error> {
        let composite = composite(self, info)?;
        let fields: Vec<(Field, WriteCall)> = composite
            .fields()
            .iter()
            .map(|field| (field.clone(), generator.writer_call(&field.declared())))
            .collect();
        let hooks = hooks(generator, composite);
        let name = info.name();
        Ok(Box::new(
            move |serializer: &Serializer, buf: &mut dyn BufMut, value: &dyn Any| {
                if let Some(hook) = &hooks.serializing {
                    hook(value);
                }
                for (field, call) in &fields {
                    let field = field.get(value).ok_or(Error::TypeMismatch(name))?;
                    call.write(serializer, buf, field)?;
                }
                if let Some(hook) = &hooks.serialized {
                    hook(value);
                }
                Ok(())
            },
        ))
    }

    fn build_reader(&self, generator: &Generator<'_>, info: &TypeInfo) -> Result<ReadFn, Error> {
        let composite = composite(self, info)?;
        let fields: Vec<(Field, ReadCall)> = composite
            .fields()
            .iter()
            .map(|field| (field.clone(), generator.reader_call(&field.declared())))
            .collect();
        let hooks = hooks(generator, composite);
        let reset = (!info.is_value_type()).then(|| info.clone());
        let name = info.name();
        Ok(Box::new(
            move |serializer: &Serializer, buf: &mut dyn Buf, slot: &mut dyn Any| {
                if let Some(info) = &reset {
                    info.reset(slot);
                }
                if let Some(hook) = &hooks.deserializing {
                    hook(&mut *slot);
                }
                for (field, call) in &fields {
                    let field = field.get_mut(slot).ok_or(Error::TypeMismatch(name))?;
                    call.read(serializer, buf, field)?;
                }
                if let Some(hook) = &hooks.deserialized {
                    hook(&mut *slot);
                }
                Ok(())
            },
        ))
    }
}
