use crate::{
    handler::{Codegen, Handler},
    info::{Kind, TypeInfo},
    routine::{IndirectReader, IndirectWriter, ReadRoutine, WriteRoutine},
};
use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, OnceLock,
    },
};

/// Record of one registered type.
///
/// The id, type and handler are fixed at registration. Routines and entry points are attached
/// later, each at most once, and never replaced. A routine is published only once every routine
/// it can call directly has a body.
pub struct TypeDescriptor {
    id: u32,
    info: TypeInfo,
    handler: Arc<dyn Handler>,
    direct: bool,

    writer: OnceLock<Arc<WriteRoutine>>,
    reader: OnceLock<Arc<ReadRoutine>>,
    writer_generations: AtomicUsize,
    reader_generations: AtomicUsize,
    writer_published: AtomicBool,
    reader_published: AtomicBool,

    pub(crate) direct_writer: OnceLock<Box<dyn Any + Send + Sync>>,
    pub(crate) direct_reader: OnceLock<Box<dyn Any + Send + Sync>>,
    pub(crate) indirect_writer: OnceLock<IndirectWriter>,
    pub(crate) indirect_reader: OnceLock<IndirectReader>,
}

impl TypeDescriptor {
    pub(crate) fn new(id: u32, info: TypeInfo, handler: Arc<dyn Handler>) -> Self {
        // Value types, arrays and sealed types with precompiled routines are called in place.
        let direct = info.is_value_type()
            || matches!(info.kind(), Kind::Array { .. })
            || (info.is_sealed() && matches!(handler.codegen(), Codegen::Static(_)));
        Self {
            id,
            info,
            handler,
            direct,
            writer: OnceLock::new(),
            reader: OnceLock::new(),
            writer_generations: AtomicUsize::new(0),
            reader_generations: AtomicUsize::new(0),
            writer_published: AtomicBool::new(false),
            reader_published: AtomicBool::new(false),
            direct_writer: OnceLock::new(),
            direct_reader: OnceLock::new(),
            indirect_writer: OnceLock::new(),
            indirect_reader: OnceLock::new(),
        }
    }

    /// Returns the assigned id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the type description.
    pub fn info(&self) -> &TypeInfo {
        &self.info
    }

    /// Returns the type name.
    pub fn name(&self) -> &'static str {
        self.info.name()
    }

    /// Returns the handler that serializes the type.
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Returns whether fields declared with this type call its routines in place.
    pub fn is_direct(&self) -> bool {
        self.direct
    }

    /// Returns the write routine, if generated.
    pub fn writer(&self) -> Option<&Arc<WriteRoutine>> {
        self.writer.get()
    }

    /// Returns the read routine, if generated.
    pub fn reader(&self) -> Option<&Arc<ReadRoutine>> {
        self.reader.get()
    }

    /// Returns the write routine if it and everything it calls directly are generated.
    pub fn published_writer(&self) -> Option<&Arc<WriteRoutine>> {
        if !self.writer_published.load(Ordering::Acquire) {
            return None;
        }
        self.writer.get()
    }

    /// Returns the read routine if it and everything it calls directly are generated.
    pub fn published_reader(&self) -> Option<&Arc<ReadRoutine>> {
        if !self.reader_published.load(Ordering::Acquire) {
            return None;
        }
        self.reader.get()
    }

    /// Returns how many write stubs were ever created for the type (at most one).
    pub fn writer_generations(&self) -> usize {
        self.writer_generations.load(Ordering::Acquire)
    }

    /// Returns how many read stubs were ever created for the type (at most one).
    pub fn reader_generations(&self) -> usize {
        self.reader_generations.load(Ordering::Acquire)
    }

    pub(crate) fn writer_stub(&self) -> &Arc<WriteRoutine> {
        self.writer.get_or_init(|| {
            self.writer_generations.fetch_add(1, Ordering::AcqRel);
            Arc::new(WriteRoutine::stub(self.info.name()))
        })
    }

    pub(crate) fn reader_stub(&self) -> &Arc<ReadRoutine> {
        self.reader.get_or_init(|| {
            self.reader_generations.fetch_add(1, Ordering::AcqRel);
            Arc::new(ReadRoutine::stub(self.info.name()))
        })
    }

    pub(crate) fn publish_writer(&self) {
        self.writer_published.store(true, Ordering::Release);
    }

    pub(crate) fn publish_reader(&self) {
        self.reader_published.store(true, Ordering::Release);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("name", &self.info.name())
            .field("handler", &self.handler.name())
            .field("direct", &self.direct)
            .finish()
    }
}
