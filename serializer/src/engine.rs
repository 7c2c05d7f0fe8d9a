//! Routine generation
//!
//! Routines are generated lazily, per closure: the first time an entry point of a type is
//! needed, the registry lock is taken and every type reachable from it that lacks a bound
//! routine goes through two passes:
//!
//! 1. _Stub pass_: an empty routine is attached to every pending type.
//! 2. _Body pass_: every pending body is built. Call targets resolve to the stubs created in
//!    the first pass, so types may refer to each other (or to themselves).
//!
//! The bodies are then bound and the routines published together. Lock-free lookups only see
//! published routines. Entry points are built on top of them, each at most once per type.

use crate::{
    config::Config,
    handler::{Codegen, Handler},
    info::TypeInfo,
    registry::{State, TypeDescriptor, NULL_ID},
    routine::{
        DirectReader, DirectWriter, IndirectReader, IndirectWriter, ReadCall, ReadRoutine,
        WriteCall, WriteRoutine,
    },
    type_map::TypeMap,
    Error, Reflect, Serializer,
};
use std::{any::TypeId, collections::HashSet, sync::Arc};
use tracing::debug;

/// Context handed to [crate::handler::GeneratorHandler]s while building routine bodies.
pub struct Generator<'a> {
    serializer: &'a Serializer,
}

impl<'a> Generator<'a> {
    /// Returns the configuration of the serializer being generated for.
    pub fn config(&self) -> &'a Config {
        self.serializer.config()
    }

    /// Returns the call target for writing a value declared as `declared`.
    ///
    /// Direct-eligible registered types are called in place, everything else goes through the
    /// envelope.
    pub fn writer_call(&self, declared: &TypeInfo) -> WriteCall {
        if let Some(descriptor) = self.serializer.registry().get(declared.id()) {
            if descriptor.is_direct() {
                if let Some(routine) = descriptor.writer() {
                    return WriteCall::Direct {
                        routine: Arc::downgrade(routine),
                        name: descriptor.name(),
                    };
                }
            }
        }
        WriteCall::Indirect(declared.clone())
    }

    /// Returns the call target for reading a value declared as `declared`.
    pub fn reader_call(&self, declared: &TypeInfo) -> ReadCall {
        if let Some(descriptor) = self.serializer.registry().get(declared.id()) {
            if descriptor.is_direct() {
                if let Some(routine) = descriptor.reader() {
                    return ReadCall::Direct {
                        routine: Arc::downgrade(routine),
                        name: descriptor.name(),
                    };
                }
            }
        }
        ReadCall::Indirect(declared.clone())
    }
}

impl Serializer {
    /// Returns the first handler claiming `info`, after validating it.
    pub(crate) fn resolve(&self, info: &TypeInfo) -> Result<Arc<dyn Handler>, Error> {
        let handler = self
            .handlers
            .iter()
            .find(|handler| handler.handles(info))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "no handler for {} ({})",
                    info.name(),
                    info.kind().label()
                ))
            })?;
        handler.validate(info, &self.config)?;
        Ok(handler.clone())
    }

    /// Registers `roots` and every type they reach, returning the types added.
    ///
    /// Types are discovered depth first, starting from the last root. Abstract types are
    /// skipped.
    pub(crate) fn add_roots(
        &self,
        state: &mut State,
        roots: Vec<TypeInfo>,
    ) -> Result<TypeMap, Error> {
        let mut added = TypeMap::new();
        let mut stack = roots;
        while let Some(info) = stack.pop() {
            if info.is_abstract() || self.registry.contains(info.id()) {
                continue;
            }
            let handler = self.resolve(&info)?;
            let id = self.registry.allocate_id(state)?;
            self.registry.insert(state, id, info.clone(), handler.clone())?;
            added.insert_info(info.clone(), id)?;
            stack.extend(
                handler
                    .subtypes(&info)
                    .into_iter()
                    .filter(|subtype| !self.registry.contains(subtype.id())),
            );
        }
        Ok(added)
    }

    /// Registers the types of an explicit map with their ids. Subtypes are not discovered.
    pub(crate) fn add_map(&self, state: &mut State, map: &TypeMap) -> Result<(), Error> {
        for (info, id) in map.iter() {
            if id == NULL_ID {
                return Err(Error::Configuration(format!(
                    "type id {NULL_ID} is reserved ({})",
                    info.name()
                )));
            }
            if let Some(existing) = self.registry.get(info.id()) {
                if existing.id() == id {
                    continue;
                }
                return Err(Error::Configuration(format!(
                    "type {} already registered with id {}, not {id}",
                    info.name(),
                    existing.id()
                )));
            }
            if let Some(existing) = self.registry.get_by_id(id) {
                return Err(Error::Configuration(format!(
                    "type id {id} already bound to {}, not {}",
                    existing.name(),
                    info.name()
                )));
            }
            if info.is_abstract() {
                return Err(Error::Configuration(format!(
                    "abstract type {} cannot be registered",
                    info.name()
                )));
            }
            let handler = self.resolve(info)?;
            self.registry.insert(state, id, info.clone(), handler)?;
        }
        Ok(())
    }

    /// Returns the registered types reachable from `root` (included).
    fn collect(&self, root: &Arc<TypeDescriptor>) -> Vec<Arc<TypeDescriptor>> {
        let mut seen = HashSet::from([root.info().id()]);
        let mut stack = vec![root.clone()];
        let mut closure = Vec::new();
        while let Some(descriptor) = stack.pop() {
            for subtype in descriptor.handler().subtypes(descriptor.info()) {
                if !seen.insert(subtype.id()) {
                    continue;
                }
                if let Some(subtype) = self.registry.get(subtype.id()) {
                    stack.push(subtype);
                }
            }
            closure.push(descriptor);
        }
        closure
    }

    /// Generates the write routines of every type reachable from `root` that lacks one.
    ///
    /// Nothing is published until every body of the closure is bound, so a routine obtained
    /// without the lock never calls an empty stub.
    pub(crate) fn generate_writers(
        &self,
        _state: &mut State,
        root: &Arc<TypeDescriptor>,
    ) -> Result<(), Error> {
        let pending: Vec<_> = self
            .collect(root)
            .into_iter()
            .filter(|descriptor| descriptor.published_writer().is_none())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        debug!(root = root.name(), types = pending.len(), pass = "stub", "generating writers");
        for descriptor in &pending {
            descriptor.writer_stub();
        }

        debug!(root = root.name(), types = pending.len(), pass = "body", "generating writers");
        let generator = Generator { serializer: self };
        let mut bodies = Vec::with_capacity(pending.len());
        for descriptor in &pending {
            let stub = descriptor.writer_stub();
            if stub.is_bound() {
                continue;
            }
            let body = match descriptor.handler().codegen() {
                Codegen::Static(handler) => handler.writer(descriptor.info())?,
                Codegen::Generator(handler) => {
                    handler.build_writer(&generator, descriptor.info())?
                }
            };
            bodies.push((stub.clone(), body));
        }
        for (stub, body) in bodies {
            stub.bind(body);
        }
        for descriptor in &pending {
            descriptor.publish_writer();
        }
        Ok(())
    }

    /// Generates the read routines of every type reachable from `root` that lacks one.
    pub(crate) fn generate_readers(
        &self,
        _state: &mut State,
        root: &Arc<TypeDescriptor>,
    ) -> Result<(), Error> {
        let pending: Vec<_> = self
            .collect(root)
            .into_iter()
            .filter(|descriptor| descriptor.published_reader().is_none())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        debug!(root = root.name(), types = pending.len(), pass = "stub", "generating readers");
        for descriptor in &pending {
            descriptor.reader_stub();
        }

        debug!(root = root.name(), types = pending.len(), pass = "body", "generating readers");
        let generator = Generator { serializer: self };
        let mut bodies = Vec::with_capacity(pending.len());
        for descriptor in &pending {
            let stub = descriptor.reader_stub();
            if stub.is_bound() {
                continue;
            }
            let body = match descriptor.handler().codegen() {
                Codegen::Static(handler) => handler.reader(descriptor.info())?,
                Codegen::Generator(handler) => {
                    handler.build_reader(&generator, descriptor.info())?
                }
            };
            bodies.push((stub.clone(), body));
        }
        for (stub, body) in bodies {
            stub.bind(body);
        }
        for descriptor in &pending {
            descriptor.publish_reader();
        }
        Ok(())
    }

    /// Returns the published write routine of `descriptor`, generating it if needed.
    fn writer_routine(&self, descriptor: &Arc<TypeDescriptor>) -> Result<Arc<WriteRoutine>, Error> {
        if let Some(routine) = descriptor.published_writer() {
            return Ok(routine.clone());
        }
        let mut state = self.registry.lock();

        // Another thread may have generated the routine while we waited.
        if let Some(routine) = descriptor.published_writer() {
            return Ok(routine.clone());
        }
        self.generate_writers(&mut state, descriptor)?;
        descriptor
            .published_writer()
            .cloned()
            .ok_or(Error::MissingRoutine(descriptor.name()))
    }

    /// Returns the published read routine of `descriptor`, generating it if needed.
    fn reader_routine(&self, descriptor: &Arc<TypeDescriptor>) -> Result<Arc<ReadRoutine>, Error> {
        if let Some(routine) = descriptor.published_reader() {
            return Ok(routine.clone());
        }
        let mut state = self.registry.lock();
        if let Some(routine) = descriptor.published_reader() {
            return Ok(routine.clone());
        }
        self.generate_readers(&mut state, descriptor)?;
        descriptor
            .published_reader()
            .cloned()
            .ok_or(Error::MissingRoutine(descriptor.name()))
    }

    /// Returns the statically typed writer of `T`.
    pub(crate) fn direct_writer<'d, T: Reflect>(
        &self,
        descriptor: &'d Arc<TypeDescriptor>,
    ) -> Result<&'d DirectWriter<T>, Error> {
        let entry = match descriptor.direct_writer.get() {
            Some(entry) => entry,
            None => {
                let routine = self.writer_routine(descriptor)?;
                descriptor.direct_writer.get_or_init(|| {
                    debug!(id = descriptor.id(), name = descriptor.name(), "built direct writer");
                    Box::new(DirectWriter::<T>::new(routine))
                })
            }
        };
        (**entry)
            .downcast_ref::<DirectWriter<T>>()
            .ok_or(Error::TypeMismatch(descriptor.name()))
    }

    /// Returns the statically typed reader of `T`.
    pub(crate) fn direct_reader<'d, T: Reflect>(
        &self,
        descriptor: &'d Arc<TypeDescriptor>,
    ) -> Result<&'d DirectReader<T>, Error> {
        let entry = match descriptor.direct_reader.get() {
            Some(entry) => entry,
            None => {
                let routine = self.reader_routine(descriptor)?;
                descriptor.direct_reader.get_or_init(|| {
                    debug!(id = descriptor.id(), name = descriptor.name(), "built direct reader");
                    Box::new(DirectReader::<T>::new(routine))
                })
            }
        };
        (**entry)
            .downcast_ref::<DirectReader<T>>()
            .ok_or(Error::TypeMismatch(descriptor.name()))
    }

    /// Returns the type-erased writer trampoline of `descriptor`.
    pub(crate) fn indirect_writer<'d>(
        &self,
        descriptor: &'d Arc<TypeDescriptor>,
    ) -> Result<&'d IndirectWriter, Error> {
        if let Some(writer) = descriptor.indirect_writer.get() {
            return Ok(writer);
        }
        let routine = self.writer_routine(descriptor)?;
        Ok(descriptor.indirect_writer.get_or_init(|| {
            debug!(id = descriptor.id(), name = descriptor.name(), "built indirect writer");
            IndirectWriter::new(descriptor.info(), routine)
        }))
    }

    /// Returns the type-erased reader trampoline of `descriptor`.
    pub(crate) fn indirect_reader<'d>(
        &self,
        descriptor: &'d Arc<TypeDescriptor>,
    ) -> Result<&'d IndirectReader, Error> {
        if let Some(reader) = descriptor.indirect_reader.get() {
            return Ok(reader);
        }
        let routine = self.reader_routine(descriptor)?;
        Ok(descriptor.indirect_reader.get_or_init(|| {
            debug!(id = descriptor.id(), name = descriptor.name(), "built indirect reader");
            IndirectReader::new(descriptor.info(), routine)
        }))
    }

    /// Returns the descriptor of `T`.
    pub(crate) fn require<T: Reflect>(&self) -> Result<Arc<TypeDescriptor>, Error> {
        self.registry
            .get(TypeId::of::<T>())
            .ok_or_else(|| Error::UnregisteredType(std::any::type_name::<T>().to_string()))
    }
}
