//! Generated routines and their entry points.
//!
//! A routine is created as an empty stub and bound to its body later, so routines can refer to
//! each other (or to themselves) before any body exists. Call sites inside bodies are either
//! [WriteCall::Direct]/[ReadCall::Direct], which invoke the routine of the declared type on the
//! value in place, or `Indirect`, which goes through the envelope.
//!
//! Each registered type exposes four entry points built on first use: direct writer and reader
//! (statically typed, no envelope, no boxing) and indirect writer and reader (type-erased
//! trampolines used by the envelope).

use crate::{envelope, info::TypeInfo, Error, Serializer};
use bytes::{Buf, BufMut};
use std::{
    any::{Any, TypeId},
    fmt,
    marker::PhantomData,
    sync::{Arc, OnceLock, Weak},
};

/// Body of a write routine.
pub type WriteFn =
    Box<dyn Fn(&Serializer, &mut dyn BufMut, &dyn Any) -> Result<(), Error> + Send + Sync>;

/// Body of a read routine. The slot holds a value of the routine's type, populated in place.
pub type ReadFn =
    Box<dyn Fn(&Serializer, &mut dyn Buf, &mut dyn Any) -> Result<(), Error> + Send + Sync>;

/// A write routine: a named stub whose body is bound at most once.
pub struct WriteRoutine {
    name: &'static str,
    body: OnceLock<WriteFn>,
}

impl WriteRoutine {
    pub(crate) fn stub(name: &'static str) -> Self {
        Self {
            name,
            body: OnceLock::new(),
        }
    }

    pub(crate) fn bind(&self, body: WriteFn) -> bool {
        self.body.set(body).is_ok()
    }

    /// Returns the name of the type the routine writes.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns whether the body has been bound.
    pub fn is_bound(&self) -> bool {
        self.body.get().is_some()
    }

    /// Writes `value` without any envelope.
    pub fn call(
        &self,
        serializer: &Serializer,
        buf: &mut dyn BufMut,
        value: &dyn Any,
    ) -> Result<(), Error> {
        let body = self.body.get().ok_or(Error::MissingRoutine(self.name))?;
        body(serializer, buf, value)
    }
}

impl fmt::Debug for WriteRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteRoutine")
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// A read routine: a named stub whose body is bound at most once.
pub struct ReadRoutine {
    name: &'static str,
    body: OnceLock<ReadFn>,
}

impl ReadRoutine {
    pub(crate) fn stub(name: &'static str) -> Self {
        Self {
            name,
            body: OnceLock::new(),
        }
    }

    pub(crate) fn bind(&self, body: ReadFn) -> bool {
        self.body.set(body).is_ok()
    }

    /// Returns the name of the type the routine reads.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns whether the body has been bound.
    pub fn is_bound(&self) -> bool {
        self.body.get().is_some()
    }

    /// Reads a value (without any envelope) into `slot`.
    pub fn call(
        &self,
        serializer: &Serializer,
        buf: &mut dyn Buf,
        slot: &mut dyn Any,
    ) -> Result<(), Error> {
        let body = self.body.get().ok_or(Error::MissingRoutine(self.name))?;
        body(serializer, buf, slot)
    }
}

impl fmt::Debug for ReadRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadRoutine")
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// How a generated body writes a value of some declared type.
pub enum WriteCall {
    /// Call the declared type's routine on the value in place.
    Direct {
        routine: Weak<WriteRoutine>,
        name: &'static str,
    },
    /// Write an envelope for the value's runtime type.
    Indirect(TypeInfo),
}

impl WriteCall {
    /// Writes `value`, a value of the declared type.
    pub fn write(
        &self,
        serializer: &Serializer,
        buf: &mut dyn BufMut,
        value: &dyn Any,
    ) -> Result<(), Error> {
        match self {
            WriteCall::Direct { routine, name } => routine
                .upgrade()
                .ok_or(Error::MissingRoutine(*name))?
                .call(serializer, buf, value),
            WriteCall::Indirect(declared) => envelope::write(serializer, buf, declared, value),
        }
    }

    /// Returns whether the call bypasses the envelope.
    pub fn is_direct(&self) -> bool {
        matches!(self, WriteCall::Direct { .. })
    }
}

/// How a generated body reads a value of some declared type.
pub enum ReadCall {
    /// Call the declared type's routine on the slot in place.
    Direct {
        routine: Weak<ReadRoutine>,
        name: &'static str,
    },
    /// Read an envelope and move the decoded value into the slot.
    Indirect(TypeInfo),
}

impl ReadCall {
    /// Reads a value of the declared type into `slot`.
    pub fn read(
        &self,
        serializer: &Serializer,
        buf: &mut dyn Buf,
        slot: &mut dyn Any,
    ) -> Result<(), Error> {
        match self {
            ReadCall::Direct { routine, name } => routine
                .upgrade()
                .ok_or(Error::MissingRoutine(*name))?
                .call(serializer, buf, slot),
            ReadCall::Indirect(declared) => envelope::read(serializer, buf, declared, slot),
        }
    }

    /// Returns whether the call bypasses the envelope.
    pub fn is_direct(&self) -> bool {
        matches!(self, ReadCall::Direct { .. })
    }
}

/// Statically typed writer for `T`.
pub struct DirectWriter<T> {
    routine: Arc<WriteRoutine>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Any> DirectWriter<T> {
    pub(crate) fn new(routine: Arc<WriteRoutine>) -> Self {
        Self {
            routine,
            _marker: PhantomData,
        }
    }

    /// Writes `value` without an envelope.
    pub fn write(
        &self,
        serializer: &Serializer,
        buf: &mut dyn BufMut,
        value: &T,
    ) -> Result<(), Error> {
        self.routine.call(serializer, buf, value)
    }
}

/// Statically typed reader for `T`.
pub struct DirectReader<T> {
    routine: Arc<ReadRoutine>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Default> DirectReader<T> {
    pub(crate) fn new(routine: Arc<ReadRoutine>) -> Self {
        Self {
            routine,
            _marker: PhantomData,
        }
    }

    /// Reads a value written without an envelope.
    pub fn read(&self, serializer: &Serializer, buf: &mut dyn Buf) -> Result<T, Error> {
        let mut value = T::default();
        self.routine.call(serializer, buf, &mut value)?;
        Ok(value)
    }
}

/// Type-erased writer trampoline.
pub struct IndirectWriter {
    id: TypeId,
    name: &'static str,
    routine: Arc<WriteRoutine>,
}

impl IndirectWriter {
    pub(crate) fn new(info: &TypeInfo, routine: Arc<WriteRoutine>) -> Self {
        Self {
            id: info.id(),
            name: info.name(),
            routine,
        }
    }

    /// Writes `value`, which must be of the trampoline's type.
    pub fn write(
        &self,
        serializer: &Serializer,
        buf: &mut dyn BufMut,
        value: &dyn Any,
    ) -> Result<(), Error> {
        if value.type_id() != self.id {
            return Err(Error::TypeMismatch(self.name));
        }
        self.routine.call(serializer, buf, value)
    }
}

/// Type-erased reader trampoline.
pub struct IndirectReader {
    new: fn() -> Box<dyn Any + Send + Sync>,
    routine: Arc<ReadRoutine>,
}

impl IndirectReader {
    pub(crate) fn new(info: &TypeInfo, routine: Arc<ReadRoutine>) -> Self {
        Self {
            new: info.new_fn(),
            routine,
        }
    }

    /// Reads a value into a new box.
    pub fn read(
        &self,
        serializer: &Serializer,
        buf: &mut dyn Buf,
    ) -> Result<Box<dyn Any + Send + Sync>, Error> {
        let mut value = (self.new)();
        self.routine.call(serializer, buf, value.as_mut())?;
        Ok(value)
    }
}
