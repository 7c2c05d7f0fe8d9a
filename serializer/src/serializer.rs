//! Serializer facade.

use crate::{
    config::Config,
    dynamic::Dynamic,
    envelope,
    handler::{self, Handler},
    info::TypeInfo,
    primitives,
    registry::{Registry, TypeDescriptor},
    type_map::TypeMap,
    varint, Error, Reflect,
};
use bytes::{Buf, BufMut, BytesMut};
use sha2::{Digest, Sha256};
use std::{
    any::{type_name, TypeId},
    fmt,
    sync::Arc,
};

/// Serializes values of a registered set of types.
///
/// Types are registered with ids assigned in discovery order. Two serializers exchanging data
/// must assign the same ids to the same types: register the same roots in the same order, or
/// share a [TypeMap]. Compare [Serializer::digest] out of band to verify agreement.
///
/// Registration checks every reachable type eagerly; routines are generated on first use.
///
/// ```
/// use commonware_serializer::{Dynamic, Reflect, Serializer, TypeInfo};
///
/// #[derive(Debug, Default, PartialEq)]
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
///
/// let serializer = Serializer::new([Point::type_info()]).unwrap();
///
/// // Without envelope
/// let bytes = serializer.encode_direct(&Point { x: -5, y: 1 }).unwrap();
/// assert_eq!(bytes.as_ref(), &[0x09, 0x02]);
/// let point: Point = serializer.decode_direct(bytes).unwrap();
/// assert_eq!(point, Point { x: -5, y: 1 });
///
/// // With envelope
/// let bytes = serializer.encode(&Dynamic::new(Point { x: 1, y: 2 })).unwrap();
/// let value = serializer.decode(bytes).unwrap();
/// assert_eq!(value.downcast_ref::<Point>(), Some(&Point { x: 1, y: 2 }));
/// ```
pub struct Serializer {
    pub(crate) registry: Registry,
    pub(crate) config: Config,
    pub(crate) handlers: Vec<Arc<dyn Handler>>,
}

impl Serializer {
    /// Creates a serializer for `roots` (and every type they reach) with the default
    /// configuration.
    pub fn new(roots: impl IntoIterator<Item = TypeInfo>) -> Result<Self, Error> {
        Self::with_config(Config::default(), roots)
    }

    /// Creates a serializer for `roots` (and every type they reach).
    pub fn with_config(
        config: Config,
        roots: impl IntoIterator<Item = TypeInfo>,
    ) -> Result<Self, Error> {
        let serializer = Self::empty(config)?;
        serializer.add_types(roots)?;
        Ok(serializer)
    }

    /// Creates a serializer from an explicit type map.
    pub fn from_type_map(config: Config, map: &TypeMap) -> Result<Self, Error> {
        let serializer = Self::empty(config)?;
        serializer.add_type_map(map)?;
        Ok(serializer)
    }

    // Every serializer starts with [Dynamic] registered (as id 1) and generated.
    fn empty(config: Config) -> Result<Self, Error> {
        let mut handlers = config.handlers.clone();
        handlers.extend(handler::builtins());
        let serializer = Self {
            registry: Registry::new(),
            config,
            handlers,
        };
        {
            let mut state = serializer.registry.lock();
            let info = Dynamic::type_info();
            let handler = serializer.resolve(&info)?;
            let id = serializer.registry.allocate_id(&mut state)?;
            let descriptor = serializer.registry.insert(&mut state, id, info, handler)?;
            serializer.generate_writers(&mut state, &descriptor)?;
            serializer.generate_readers(&mut state, &descriptor)?;
        }
        Ok(serializer)
    }

    /// Registers `roots` and every type they reach, returning the types added by this call.
    ///
    /// Already registered and abstract types are skipped.
    pub fn add_types(&self, roots: impl IntoIterator<Item = TypeInfo>) -> Result<TypeMap, Error> {
        let mut state = self.registry.lock();
        self.add_roots(&mut state, roots.into_iter().collect())
    }

    /// Registers the types of `map` with exactly the given ids (without discovering subtypes).
    ///
    /// Entries already registered with the same id are skipped.
    pub fn add_type_map(&self, map: &TypeMap) -> Result<(), Error> {
        let mut state = self.registry.lock();
        self.add_map(&mut state, map)
    }

    /// Returns every registered type with its id.
    pub fn type_map(&self) -> TypeMap {
        let mut map = TypeMap::new();
        for descriptor in self.registry.descriptors() {
            // Ids and types are unique in the registry.
            let _ = map.insert_info(descriptor.info().clone(), descriptor.id());
        }
        map
    }

    /// Returns the lowercase hex SHA-256 of every `(id, name)` pair, in id order.
    ///
    /// Each pair is hashed as `varint(id)` followed by the name in string framing.
    pub fn digest(&self) -> String {
        let mut buf = BytesMut::new();
        for descriptor in self.registry.descriptors() {
            varint::write(descriptor.id(), &mut buf);
            // Type names always fit a length field.
            let _ = primitives::write_str(Some(descriptor.name()), &mut buf);
        }
        let mut hasher = Sha256::new();
        hasher.update(&buf);
        hex(&hasher.finalize())
    }

    /// Returns the descriptor of `T`, if registered.
    pub fn descriptor<T: Reflect>(&self) -> Option<Arc<TypeDescriptor>> {
        self.registry.get(TypeId::of::<T>())
    }

    /// Returns the descriptor bound to `id`, if any.
    pub fn descriptor_by_id(&self, id: u32) -> Option<Arc<TypeDescriptor>> {
        self.registry.get_by_id(id)
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Writes the content of `value` in an envelope.
    pub fn serialize(&self, buf: &mut impl BufMut, value: &Dynamic) -> Result<(), Error> {
        envelope::write_dynamic(self, buf, value)
    }

    /// Writes `value` in an envelope.
    pub fn serialize_value<T: Reflect>(
        &self,
        buf: &mut impl BufMut,
        value: &T,
    ) -> Result<(), Error> {
        envelope::write_value(self, buf, value, type_name::<T>())
    }

    /// Reads an envelope.
    pub fn deserialize(&self, buf: &mut impl Buf) -> Result<Dynamic, Error> {
        envelope::read_dynamic(self, buf)
    }

    /// Reads an envelope holding a `T` (or null).
    pub fn deserialize_as<T: Reflect>(&self, buf: &mut impl Buf) -> Result<Option<T>, Error> {
        let value = self.deserialize(buf)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .downcast::<T>()
            .map(Some)
            .map_err(|_| Error::TypeMismatch(type_name::<T>()))
    }

    /// Writes `value` without an envelope.
    pub fn serialize_direct<T: Reflect>(
        &self,
        buf: &mut impl BufMut,
        value: &T,
    ) -> Result<(), Error> {
        let descriptor = self.require::<T>()?;
        self.direct_writer::<T>(&descriptor)?.write(self, buf, value)
    }

    /// Reads a `T` written without an envelope.
    pub fn deserialize_direct<T: Reflect>(&self, buf: &mut impl Buf) -> Result<T, Error> {
        let descriptor = self.require::<T>()?;
        self.direct_reader::<T>(&descriptor)?.read(self, buf)
    }

    /// Encodes the content of `value` in an envelope.
    pub fn encode(&self, value: &Dynamic) -> Result<BytesMut, Error> {
        let mut buf = BytesMut::new();
        self.serialize(&mut buf, value)?;
        Ok(buf)
    }

    /// Decodes an envelope, ensuring `buf` is fully consumed.
    pub fn decode(&self, mut buf: impl Buf) -> Result<Dynamic, Error> {
        let value = self.deserialize(&mut buf)?;
        ensure_consumed(&buf)?;
        Ok(value)
    }

    /// Encodes `value` without an envelope.
    pub fn encode_direct<T: Reflect>(&self, value: &T) -> Result<BytesMut, Error> {
        let mut buf = BytesMut::new();
        self.serialize_direct(&mut buf, value)?;
        Ok(buf)
    }

    /// Decodes a `T` written without an envelope, ensuring `buf` is fully consumed.
    pub fn decode_direct<T: Reflect>(&self, mut buf: impl Buf) -> Result<T, Error> {
        let value = self.deserialize_direct(&mut buf)?;
        ensure_consumed(&buf)?;
        Ok(value)
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("types", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

fn ensure_consumed(buf: &impl Buf) -> Result<(), Error> {
    let remaining = buf.remaining();
    if remaining > 0 {
        return Err(Error::ExtraData(remaining));
    }
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    let mut hex = String::new();
    for byte in bytes.iter() {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_preregistered() {
        let serializer = Serializer::new([]).unwrap();
        let descriptor = serializer.descriptor::<Dynamic>().unwrap();
        assert_eq!(descriptor.id(), 1);
        assert!(descriptor.writer().unwrap().is_bound());
        assert!(descriptor.reader().unwrap().is_bound());
        assert_eq!(serializer.type_map().len(), 1);
    }

    #[test]
    fn test_null_envelope() {
        let serializer = Serializer::new([]).unwrap();
        let bytes = serializer.encode(&Dynamic::null()).unwrap();
        assert_eq!(bytes.as_ref(), &[0x00]);
        assert!(serializer.decode(bytes).unwrap().is_null());
    }

    #[test]
    fn test_primitive_envelope() {
        let serializer = Serializer::new([u32::type_info()]).unwrap();
        let id = serializer.descriptor::<u32>().unwrap().id();
        assert_eq!(id, 2);

        let bytes = serializer.encode(&Dynamic::new(300u32)).unwrap();
        assert_eq!(bytes.as_ref(), &[0x02, 0xAC, 0x02]);
        let value = serializer.decode(bytes).unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&300));
    }

    #[test]
    fn test_unregistered_value() {
        let serializer = Serializer::new([]).unwrap();
        let err = serializer.encode(&Dynamic::new(1u64)).unwrap_err();
        assert!(matches!(err, Error::UnregisteredType(name) if name == "u64"));
        let err = serializer.encode_direct(&1u64).unwrap_err();
        assert!(matches!(err, Error::UnregisteredType(_)));
    }

    #[test]
    fn test_unknown_id() {
        let serializer = Serializer::new([]).unwrap();
        let err = serializer.decode(&[0x07, 0x00][..]).unwrap_err();
        assert!(matches!(err, Error::UnknownTypeId(7)));
    }

    #[test]
    fn test_extra_data() {
        let serializer = Serializer::new([u8::type_info()]).unwrap();
        let err = serializer.decode_direct::<u8>(&[0x01, 0x02][..]).unwrap_err();
        assert!(matches!(err, Error::ExtraData(1)));
        let err = serializer.decode(&[0x00, 0x00][..]).unwrap_err();
        assert!(matches!(err, Error::ExtraData(1)));
    }

    #[test]
    fn test_deserialize_as() {
        let serializer = Serializer::new([String::type_info(), u32::type_info()]).unwrap();
        let mut buf = BytesMut::new();
        serializer.serialize_value(&mut buf, &"A".to_string()).unwrap();
        serializer.serialize_value(&mut buf, &5u32).unwrap();
        serializer.serialize(&mut buf, &Dynamic::null()).unwrap();

        let mut buf = buf.freeze();
        assert_eq!(
            serializer.deserialize_as::<String>(&mut buf).unwrap(),
            Some("A".to_string())
        );
        assert!(matches!(
            serializer.deserialize_as::<String>(&mut buf),
            Err(Error::TypeMismatch(_))
        ));
        assert_eq!(serializer.deserialize_as::<u32>(&mut buf).unwrap(), None);
        assert!(!buf.has_remaining());
    }
}
