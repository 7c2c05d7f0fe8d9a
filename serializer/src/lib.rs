//! Serialize object graphs.
//!
//! # Overview
//!
//! A binary serializer for graphs of statically known types. Each registered type is assigned
//! a small numeric id and gets a write and a read routine, generated on first use. Values are
//! written in a compact format: integers as varints (zigzag for signed ones), strings and byte
//! arrays length-prefixed, composites as their fields in a fixed order.
//!
//! Slots whose concrete type is not known statically ([Dynamic] values, interface fields,
//! reference composites, maps) are written in an _envelope_: `varint(id)` of the runtime type,
//! then its payload. Id `0` encodes null. Value types and sequences are written in place.
//!
//! Writer and reader must agree on the id of every type. Register the same roots in the same
//! order (or share a [TypeMap]) and compare [Serializer::digest] out of band.
//!
//! # Describing Types
//!
//! Types implement [Reflect] to describe their shape with a [TypeInfo]. The crate implements it
//! for primitives, [String], [Decimal], [bytes::Bytes], [Vec], [Option], maps and [Dynamic].
//!
//! ```
//! use commonware_serializer::{Dynamic, Reflect, Serializer, TypeInfo};
//!
//! #[derive(Debug, Default)]
//! struct Shape {
//!     name: String,
//!     points: Vec<Point>,
//!     extra: Dynamic,
//! }
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Reflect for Shape {
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::composite::<Self>()
//!             .field("name", |s| &s.name, |s| &mut s.name)
//!             .field("points", |s| &s.points, |s| &mut s.points)
//!             .field("extra", |s| &s.extra, |s| &mut s.extra)
//!             .build()
//!     }
//! }
//!
//! impl Reflect for Point {
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::composite::<Self>()
//!             .value_type()
//!             .field("x", |p| &p.x, |p| &mut p.x)
//!             .field("y", |p| &p.y, |p| &mut p.y)
//!             .build()
//!     }
//! }
//!
//! let serializer = Serializer::new([Shape::type_info(), u64::type_info()]).unwrap();
//! let shape = Shape {
//!     name: "triangle".to_string(),
//!     points: vec![Point { x: 0, y: 0 }, Point { x: 1, y: 0 }, Point { x: 0, y: 1 }],
//!     extra: Dynamic::new(7u64),
//! };
//! let bytes = serializer.encode(&Dynamic::new(shape)).unwrap();
//! let decoded = serializer.decode(bytes).unwrap().downcast::<Shape>().unwrap();
//! assert_eq!(decoded.points.len(), 3);
//! assert_eq!(decoded.extra.downcast_ref::<u64>(), Some(&7));
//! ```
//!
//! # Custom Handlers
//!
//! A [handler::Handler] decides how a family of types is serialized. Custom handlers passed in
//! [Config] take precedence over the built-in ones (see [NoOpHandler]).

pub mod cache;
pub mod codec;
pub mod config;
pub mod dynamic;
pub mod engine;
mod envelope;
pub mod error;
pub mod handler;
pub mod info;
pub mod primitives;
pub mod reflect;
pub mod registry;
pub mod routine;
pub mod serializer;
pub mod type_map;
pub mod varint;

// Re-export main types and traits
pub use cache::{SerializerCache, TypedSerializer};
pub use codec::{Decode, Encode, EncodeSize, Read, Write};
pub use config::Config;
pub use dynamic::Dynamic;
pub use error::Error;
pub use handler::NoOpHandler;
pub use info::{CompositeBuilder, Kind, TypeInfo};
pub use primitives::Decimal;
pub use reflect::Reflect;
pub use registry::{TypeDescriptor, NULL_ID};
pub use serializer::Serializer;
pub use type_map::TypeMap;
