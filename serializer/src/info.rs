//! Type model
//!
//! Every registrable type describes its own shape with a [TypeInfo]: its identity, the [Kind]
//! of codec it needs, and type-erased operations to construct, reset and assign values. The
//! handlers consult the [Kind] to classify a type, list the types it depends on, and build its
//! routines.
//!
//! References to other types are stored as [TypeRef] function pointers and only resolved when
//! needed, so a type may (directly or transitively) contain itself.

use crate::{dynamic::Dynamic, reflect::Reflect, Error};
use bytes::{Buf, BufMut};
use std::{
    any::{type_name, Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::Arc,
};

/// A lazily resolved reference to the [TypeInfo] of another type.
pub type TypeRef = fn() -> TypeInfo;

/// Type-erased access to a value nested inside another value.
pub trait Accessor: Send + Sync {
    /// Returns the nested value, or `None` if `owner` is not of the expected type.
    fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any>;

    /// Returns the nested value mutably, or `None` if `owner` is not of the expected type.
    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

struct FieldAccessor<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T: Any, F: Any> Accessor for FieldAccessor<T, F> {
    fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        let owner = owner.downcast_ref::<T>()?;
        Some((self.get)(owner) as &dyn Any)
    }

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let owner = owner.downcast_mut::<T>()?;
        Some((self.get_mut)(owner) as &mut dyn Any)
    }
}

// Access through an embedded base value
struct Projected {
    base: Arc<dyn Accessor>,
    field: Arc<dyn Accessor>,
}

impl Accessor for Projected {
    fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        self.field.get(self.base.get(owner)?)
    }

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        self.field.get_mut(self.base.get_mut(owner)?)
    }
}

/// A serializable field of a composite type.
#[derive(Clone)]
pub struct Field {
    name: &'static str,
    declared: TypeRef,
    accessor: Arc<dyn Accessor>,
}

impl Field {
    /// Returns the field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared (static) type of the field.
    pub fn declared(&self) -> TypeInfo {
        (self.declared)()
    }

    /// Returns the field of `owner`.
    pub fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        self.accessor.get(owner)
    }

    /// Returns the field of `owner` mutably.
    pub fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        self.accessor.get_mut(owner)
    }

    fn project(&self, base: &Arc<dyn Accessor>) -> Self {
        Self {
            name: self.name,
            declared: self.declared,
            accessor: Arc::new(Projected {
                base: base.clone(),
                field: self.accessor.clone(),
            }),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").field("name", &self.name).finish()
    }
}

pub(crate) type Hook = Arc<dyn Fn(&dyn Any) + Send + Sync>;
pub(crate) type HookMut = Arc<dyn Fn(&mut dyn Any) + Send + Sync>;

/// Lifecycle hooks of a composite type.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) serializing: Option<Hook>,
    pub(crate) serialized: Option<Hook>,
    pub(crate) deserializing: Option<HookMut>,
    pub(crate) deserialized: Option<HookMut>,
}

impl Hooks {
    /// Returns whether no hook is set.
    pub fn is_empty(&self) -> bool {
        self.serializing.is_none()
            && self.serialized.is_none()
            && self.deserializing.is_none()
            && self.deserialized.is_none()
    }
}

fn hook<T: Any>(hook: fn(&T)) -> Hook {
    Arc::new(move |value: &dyn Any| {
        if let Some(value) = value.downcast_ref::<T>() {
            hook(value);
        }
    })
}

fn hook_mut<T: Any>(hook: fn(&mut T)) -> HookMut {
    Arc::new(move |value: &mut dyn Any| {
        if let Some(value) = value.downcast_mut::<T>() {
            hook(value);
        }
    })
}

/// Shape of a composite type.
#[derive(Clone)]
pub struct Composite {
    fields: Vec<Field>,
    base: Option<TypeRef>,
    hooks: Hooks,
}

impl Composite {
    /// Returns the serializable fields, base fields first.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the base type, if any.
    pub fn base(&self) -> Option<TypeInfo> {
        self.base.map(|base| base())
    }

    /// Returns the lifecycle hooks.
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }
}

/// Type-erased codec for an enumeration.
pub trait EnumOps: Send + Sync {
    /// Writes the discriminant of `value`.
    fn write(&self, value: &dyn Any, buf: &mut dyn BufMut) -> Result<(), Error>;

    /// Reads a discriminant into `slot`.
    fn read(&self, buf: &mut dyn Buf, slot: &mut dyn Any) -> Result<(), Error>;
}

struct EnumCodec<E, R> {
    to: fn(&E) -> R,
    from: fn(R) -> Option<E>,
}

impl<E, R> EnumOps for EnumCodec<E, R>
where
    E: Any,
    R: crate::codec::Write + crate::codec::Read + 'static,
{
    fn write(&self, value: &dyn Any, buf: &mut dyn BufMut) -> Result<(), Error> {
        let value = value
            .downcast_ref::<E>()
            .ok_or(Error::TypeMismatch(type_name::<E>()))?;
        (self.to)(value).write(buf);
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf, slot: &mut dyn Any) -> Result<(), Error> {
        let slot = slot
            .downcast_mut::<E>()
            .ok_or(Error::TypeMismatch(type_name::<E>()))?;
        *slot = (self.from)(R::read(buf)?).ok_or_else(|| {
            Error::InvalidData(type_name::<E>(), "unknown discriminant".to_string())
        })?;
        Ok(())
    }
}

/// Type-erased operations on a sequence type.
pub trait SequenceOps: Send + Sync {
    /// Returns the number of elements, or `None` if `value` is not of the expected type.
    fn len(&self, value: &dyn Any) -> Option<usize>;

    /// Visits each element in order.
    fn for_each(
        &self,
        value: &dyn Any,
        visit: &mut dyn FnMut(&dyn Any) -> Result<(), Error>,
    ) -> Result<(), Error>;

    /// Replaces the contents of `slot` with `len` elements produced by `read`, reserving at
    /// most `capacity` elements up front.
    fn fill(
        &self,
        slot: &mut dyn Any,
        len: usize,
        capacity: usize,
        read: &mut dyn FnMut(&mut dyn Any) -> Result<(), Error>,
    ) -> Result<(), Error>;
}

/// Type-erased operations on a map type.
pub trait MapOps: Send + Sync {
    /// Returns the number of entries, or `None` if `value` is not of the expected type.
    fn len(&self, value: &dyn Any) -> Option<usize>;

    /// Visits each entry.
    fn for_each(
        &self,
        value: &dyn Any,
        visit: &mut dyn FnMut(&dyn Any, &dyn Any) -> Result<(), Error>,
    ) -> Result<(), Error>;

    /// Replaces the contents of `slot` with `len` entries produced by `read`.
    fn fill(
        &self,
        slot: &mut dyn Any,
        len: usize,
        read: &mut dyn FnMut(&mut dyn Any, &mut dyn Any) -> Result<(), Error>,
    ) -> Result<(), Error>;
}

/// Type-erased operations on an optional value.
pub trait NullableOps: Send + Sync {
    /// Returns the contained value, if present.
    fn get<'a>(&self, value: &'a dyn Any) -> Result<Option<&'a dyn Any>, Error>;

    /// Sets `slot` to absent, or to a value produced by `read`.
    fn fill(
        &self,
        slot: &mut dyn Any,
        present: bool,
        read: &mut dyn FnMut(&mut dyn Any) -> Result<(), Error>,
    ) -> Result<(), Error>;
}

/// The codec family of a type.
#[derive(Clone)]
pub enum Kind {
    /// The polymorphic [Dynamic] slot.
    Dynamic,
    /// An abstract type: a wrapper around a [Dynamic] slot. Never registered itself.
    Interface(Arc<dyn Accessor>),
    /// A leaf type with a fixed encoding.
    Primitive,
    /// A C-like enumeration written as its discriminant.
    Enum(Arc<dyn EnumOps>),
    /// A length-prefixed sequence.
    Array {
        element: TypeRef,
        ops: Arc<dyn SequenceOps>,
    },
    /// A length-prefixed sequence of key/value pairs.
    Map {
        key: TypeRef,
        value: TypeRef,
        ops: Arc<dyn MapOps>,
    },
    /// A presence flag followed by an optional value.
    Nullable {
        inner: TypeRef,
        ops: Arc<dyn NullableOps>,
    },
    /// An ordered list of fields.
    Composite(Composite),
    /// A type that only a custom handler can serialize.
    Opaque,
}

impl Kind {
    /// Returns a short label for the kind.
    pub fn label(&self) -> &'static str {
        match self {
            Kind::Dynamic => "dynamic",
            Kind::Interface(_) => "interface",
            Kind::Primitive => "primitive",
            Kind::Enum(_) => "enum",
            Kind::Array { .. } => "array",
            Kind::Map { .. } => "map",
            Kind::Nullable { .. } => "nullable",
            Kind::Composite(_) => "composite",
            Kind::Opaque => "opaque",
        }
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone)]
struct Inner {
    id: TypeId,
    name: &'static str,
    kind: Kind,
    value_type: bool,
    sealed: bool,
    new: fn() -> Box<dyn Any + Send + Sync>,
    reset: fn(&mut dyn Any),
    assign: fn(&mut dyn Any, Box<dyn Any + Send + Sync>) -> Result<(), Error>,
}

fn new_value<T: Reflect>() -> Box<dyn Any + Send + Sync> {
    Box::<T>::default()
}

fn reset_value<T: Reflect>(slot: &mut dyn Any) {
    if let Some(slot) = slot.downcast_mut::<T>() {
        *slot = T::default();
    }
}

fn assign_value<T: Reflect>(
    slot: &mut dyn Any,
    value: Box<dyn Any + Send + Sync>,
) -> Result<(), Error> {
    let slot = slot
        .downcast_mut::<T>()
        .ok_or(Error::TypeMismatch(type_name::<T>()))?;
    let value = value
        .downcast::<T>()
        .map_err(|_| Error::TypeMismatch(type_name::<T>()))?;
    *slot = *value;
    Ok(())
}

/// Description of a registrable type.
///
/// Cheap to clone. Two descriptions are equal when they describe the same Rust type.
#[derive(Clone)]
pub struct TypeInfo(Arc<Inner>);

impl TypeInfo {
    fn of<T: Reflect>(kind: Kind) -> Self {
        Self(Arc::new(Inner {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            kind,
            value_type: false,
            sealed: false,
            new: new_value::<T>,
            reset: reset_value::<T>,
            assign: assign_value::<T>,
        }))
    }

    fn modify(self, f: impl FnOnce(&mut Inner)) -> Self {
        let mut inner = Arc::unwrap_or_clone(self.0);
        f(&mut inner);
        Self(Arc::new(inner))
    }

    /// Describes a leaf type. Only types with a built-in leaf encoding (or a custom handler)
    /// can be registered this way.
    pub fn primitive<T: Reflect>() -> Self {
        Self::of::<T>(Kind::Primitive)
            .with_value_type(true)
            .with_sealed(true)
    }

    /// Describes the [Dynamic] slot.
    pub fn dynamic() -> Self {
        Self::of::<Dynamic>(Kind::Dynamic)
    }

    /// Describes an abstract type: a wrapper around a [Dynamic] slot.
    ///
    /// Abstract types are skipped during discovery and rejected in explicit type maps; fields
    /// declared with them are always enveloped.
    pub fn interface<T: Reflect>(
        get: fn(&T) -> &Dynamic,
        get_mut: fn(&mut T) -> &mut Dynamic,
    ) -> Self {
        Self::of::<T>(Kind::Interface(Arc::new(FieldAccessor { get, get_mut })))
    }

    /// Describes a C-like enumeration written as a leaf representation `R`.
    ///
    /// Decoding fails with [Error::InvalidData] when `from` rejects the discriminant.
    pub fn enumeration<E, R>(to: fn(&E) -> R, from: fn(R) -> Option<E>) -> Self
    where
        E: Reflect,
        R: crate::codec::Write + crate::codec::Read + Send + Sync + 'static,
    {
        Self::of::<E>(Kind::Enum(Arc::new(EnumCodec { to, from }))).with_value_type(true)
    }

    /// Describes a sequence `T` of elements `E`.
    pub fn array<T: Reflect, E: Reflect>(ops: impl SequenceOps + 'static) -> Self {
        Self::of::<T>(Kind::Array {
            element: E::type_info,
            ops: Arc::new(ops),
        })
    }

    /// Describes a map `T` from `K` to `V`.
    pub fn map<T: Reflect, K: Reflect, V: Reflect>(ops: impl MapOps + 'static) -> Self {
        Self::of::<T>(Kind::Map {
            key: K::type_info,
            value: V::type_info,
            ops: Arc::new(ops),
        })
    }

    /// Describes an optional `I`.
    pub fn nullable<T: Reflect, I: Reflect>(ops: impl NullableOps + 'static) -> Self {
        Self::of::<T>(Kind::Nullable {
            inner: I::type_info,
            ops: Arc::new(ops),
        })
        .with_value_type(true)
    }

    /// Starts describing a composite type.
    pub fn composite<T: Reflect>() -> CompositeBuilder<T> {
        CompositeBuilder {
            name: None,
            value_type: false,
            sealed: false,
            base: None,
            fields: Vec::new(),
            hooks: Hooks::default(),
            _marker: PhantomData,
        }
    }

    /// Describes a type without a built-in codec.
    pub fn opaque<T: Reflect>() -> Self {
        Self::of::<T>(Kind::Opaque)
    }

    /// Overrides the name used in the compatibility digest.
    pub fn with_name(self, name: &'static str) -> Self {
        self.modify(|inner| inner.name = name)
    }

    /// Marks the type as non-extensible.
    pub fn with_sealed(self, sealed: bool) -> Self {
        self.modify(|inner| inner.sealed = sealed)
    }

    /// Marks the type as a value type.
    pub fn with_value_type(self, value_type: bool) -> Self {
        self.modify(|inner| inner.value_type = value_type)
    }

    /// Returns the Rust type identity.
    pub fn id(&self) -> TypeId {
        self.0.id
    }

    /// Returns the type name.
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// Returns the codec family.
    pub fn kind(&self) -> &Kind {
        &self.0.kind
    }

    /// Returns whether the type is a value type.
    pub fn is_value_type(&self) -> bool {
        self.0.value_type
    }

    /// Returns whether the type is non-extensible.
    pub fn is_sealed(&self) -> bool {
        self.0.sealed
    }

    /// Returns whether the type is abstract.
    pub fn is_abstract(&self) -> bool {
        matches!(self.0.kind, Kind::Interface(_))
    }

    /// Returns a new default value of the type.
    pub fn new_value(&self) -> Box<dyn Any + Send + Sync> {
        (self.0.new)()
    }

    /// Resets `slot` to the default value. Does nothing if `slot` has another type.
    pub fn reset(&self, slot: &mut dyn Any) {
        (self.0.reset)(slot)
    }

    /// Moves `value` into `slot`.
    ///
    /// Fails with [Error::TypeMismatch] unless both are of this type.
    pub fn assign(
        &self,
        slot: &mut dyn Any,
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<(), Error> {
        (self.0.assign)(slot, value)
    }

    pub(crate) fn new_fn(&self) -> fn() -> Box<dyn Any + Send + Sync> {
        self.0.new
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .finish()
    }
}

/// Builder for the [TypeInfo] of a composite type.
///
/// Fields are serialized base first; within each level they are ordered by name.
///
/// ```
/// use commonware_serializer::{Reflect, TypeInfo};
///
/// #[derive(Default)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Reflect for Point {
///     fn type_info() -> TypeInfo {
///         TypeInfo::composite::<Self>()
///             .value_type()
///             .field("x", |p| &p.x, |p| &mut p.x)
///             .field("y", |p| &p.y, |p| &mut p.y)
///             .build()
///     }
/// }
/// ```
pub struct CompositeBuilder<T> {
    name: Option<&'static str>,
    value_type: bool,
    sealed: bool,
    base: Option<(TypeRef, Arc<dyn Accessor>)>,
    fields: Vec<Field>,
    hooks: Hooks,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Reflect> CompositeBuilder<T> {
    /// Marks the type as a value type (eligible for direct calls, no lifecycle hooks).
    pub fn value_type(mut self) -> Self {
        self.value_type = true;
        self
    }

    /// Marks the type as non-extensible.
    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    /// Overrides the name used in the compatibility digest.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Embeds a composite base whose fields are serialized before the fields of `T`.
    pub fn base<B: Reflect>(mut self, get: fn(&T) -> &B, get_mut: fn(&mut T) -> &mut B) -> Self {
        self.base = Some((B::type_info, Arc::new(FieldAccessor { get, get_mut })));
        self
    }

    /// Adds a serializable field.
    pub fn field<F: Reflect>(
        mut self,
        name: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        self.fields.push(Field {
            name,
            declared: F::type_info,
            accessor: Arc::new(FieldAccessor { get, get_mut }),
        });
        self
    }

    /// Invoked before the fields of a value are written.
    pub fn on_serializing(mut self, f: fn(&T)) -> Self {
        self.hooks.serializing = Some(hook(f));
        self
    }

    /// Invoked after the fields of a value are written.
    pub fn on_serialized(mut self, f: fn(&T)) -> Self {
        self.hooks.serialized = Some(hook(f));
        self
    }

    /// Invoked on the default value before its fields are read.
    pub fn on_deserializing(mut self, f: fn(&mut T)) -> Self {
        self.hooks.deserializing = Some(hook_mut(f));
        self
    }

    /// Invoked after the fields of a value are read.
    pub fn on_deserialized(mut self, f: fn(&mut T)) -> Self {
        self.hooks.deserialized = Some(hook_mut(f));
        self
    }

    /// Finishes the description.
    pub fn build(self) -> TypeInfo {
        let (name, value_type, sealed) = (self.name, self.value_type, self.sealed);
        let mut own = self.fields;
        own.sort_by(|a, b| a.name.cmp(b.name));

        let mut fields = Vec::new();
        let base = self.base.map(|(base, accessor)| {
            // A non-composite base contributes no fields; registration rejects it.
            if let Kind::Composite(composite) = base().kind() {
                fields.extend(composite.fields.iter().map(|field| field.project(&accessor)));
            }
            base
        });
        fields.extend(own);

        let composite = Composite {
            fields,
            base,
            hooks: self.hooks,
        };
        TypeInfo::of::<T>(Kind::Composite(composite)).modify(|inner| {
            inner.value_type = value_type;
            inner.sealed = sealed;
            if let Some(name) = name {
                inner.name = name;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Base {
        id: u64,
        alpha: String,
    }

    impl Reflect for Base {
        fn type_info() -> TypeInfo {
            TypeInfo::composite::<Self>()
                .field("id", |b| &b.id, |b| &mut b.id)
                .field("alpha", |b| &b.alpha, |b| &mut b.alpha)
                .build()
        }
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
        zeta: u32,
        beta: bool,
    }

    impl Reflect for Derived {
        fn type_info() -> TypeInfo {
            TypeInfo::composite::<Self>()
                .named("tests.Derived")
                .base(|d| &d.base, |d| &mut d.base)
                .field("zeta", |d| &d.zeta, |d| &mut d.zeta)
                .field("beta", |d| &d.beta, |d| &mut d.beta)
                .build()
        }
    }

    fn composite(info: &TypeInfo) -> &Composite {
        match info.kind() {
            Kind::Composite(composite) => composite,
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_field_order_base_first() {
        let info = Derived::type_info();
        let names: Vec<_> = composite(&info).fields().iter().map(Field::name).collect();
        assert_eq!(names, vec!["alpha", "id", "beta", "zeta"]);
        assert_eq!(info.name(), "tests.Derived");
        assert_eq!(composite(&info).base(), Some(Base::type_info()));
    }

    #[test]
    fn test_projected_access() {
        let info = Derived::type_info();
        let fields = composite(&info).fields();
        let mut value = Derived {
            base: Base {
                id: 9,
                alpha: "a".into(),
            },
            zeta: 3,
            beta: true,
        };

        let id = fields[1].get(&value).unwrap();
        assert_eq!(id.downcast_ref::<u64>(), Some(&9));

        *fields[1]
            .get_mut(&mut value)
            .unwrap()
            .downcast_mut::<u64>()
            .unwrap() = 10;
        assert_eq!(value.base.id, 10);

        // Wrong owner type
        assert!(fields[0].get(&5u32).is_none());
    }

    #[test]
    fn test_erased_constructors() {
        let info = u32::type_info();
        let mut slot = info.new_value();
        assert_eq!(slot.downcast_ref::<u32>(), Some(&0));

        info.assign(slot.as_mut(), Box::new(7u32)).unwrap();
        assert_eq!(slot.downcast_ref::<u32>(), Some(&7));
        assert!(matches!(
            info.assign(slot.as_mut(), Box::new(7u64)),
            Err(Error::TypeMismatch(_))
        ));

        info.reset(slot.as_mut());
        assert_eq!(slot.downcast_ref::<u32>(), Some(&0));
    }

    #[test]
    fn test_flags() {
        let info = u32::type_info();
        assert!(info.is_value_type() && info.is_sealed() && !info.is_abstract());

        let info = Derived::type_info();
        assert!(!info.is_value_type() && !info.is_sealed());

        let info = info.with_sealed(true).with_name("renamed");
        assert!(info.is_sealed());
        assert_eq!(info.name(), "renamed");
        assert_eq!(info, Derived::type_info());
    }
}
