//! Polymorphic, recursive and customized type graphs.

use bytes::{Buf, BufMut};
use commonware_serializer::{
    handler::{Codegen, Handler, StaticHandler},
    routine::{ReadFn, WriteFn},
    Config, Dynamic, Error, NoOpHandler, Reflect, Serializer, TypeInfo,
};
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

#[derive(Debug, Default, PartialEq)]
struct Circle {
    radius: f64,
}

impl Reflect for Circle {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .field("radius", |c| &c.radius, |c| &mut c.radius)
            .build()
    }
}

#[derive(Debug, Default, PartialEq)]
struct Square {
    side: u16,
}

impl Reflect for Square {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .value_type()
            .field("side", |s| &s.side, |s| &mut s.side)
            .build()
    }
}

/// An abstract shape: any registered type.
#[derive(Debug, Default)]
struct Shape(Dynamic);

impl Reflect for Shape {
    fn type_info() -> TypeInfo {
        TypeInfo::interface::<Self>(|s| &s.0, |s| &mut s.0)
    }
}

#[derive(Debug, Default)]
struct Scene {
    shapes: Vec<Shape>,
    tags: HashMap<String, Dynamic>,
}

impl Reflect for Scene {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .field("shapes", |s| &s.shapes, |s| &mut s.shapes)
            .field("tags", |s| &s.tags, |s| &mut s.tags)
            .build()
    }
}

#[test]
fn test_polymorphic_values() {
    let serializer = Serializer::new([
        Vec::<Dynamic>::type_info(),
        Circle::type_info(),
        Square::type_info(),
        u32::type_info(),
    ])
    .unwrap();

    let values = vec![
        Dynamic::new(1u32),
        Dynamic::null(),
        Dynamic::new(Circle { radius: 0.5 }),
        Dynamic::new(Square { side: 3 }),
        Dynamic::new(vec![Dynamic::new(2u32)]),
    ];
    let bytes = serializer.encode_direct(&values).unwrap();
    let decoded: Vec<Dynamic> = serializer.decode_direct(bytes).unwrap();

    assert_eq!(decoded.len(), 5);
    assert_eq!(decoded[0].downcast_ref::<u32>(), Some(&1));
    assert!(decoded[1].is_null());
    assert_eq!(decoded[2].downcast_ref::<Circle>(), Some(&Circle { radius: 0.5 }));
    assert_eq!(decoded[3].downcast_ref::<Square>(), Some(&Square { side: 3 }));
    let nested = decoded[4].downcast_ref::<Vec<Dynamic>>().unwrap();
    assert_eq!(nested[0].downcast_ref::<u32>(), Some(&2));
}

#[test]
fn test_interface_fields() {
    let serializer = Serializer::new([
        Scene::type_info(),
        Circle::type_info(),
        Square::type_info(),
        bool::type_info(),
    ])
    .unwrap();
    assert!(serializer.descriptor::<Shape>().is_none());

    let scene = Scene {
        shapes: vec![
            Shape(Dynamic::new(Circle { radius: 2.0 })),
            Shape(Dynamic::null()),
            Shape(Dynamic::new(Square { side: 1 })),
        ],
        tags: HashMap::from([("visible".to_string(), Dynamic::new(true))]),
    };
    let bytes = serializer.encode(&Dynamic::new(scene)).unwrap();
    let scene = serializer.decode(bytes).unwrap().downcast::<Scene>().unwrap();

    assert_eq!(scene.shapes.len(), 3);
    assert_eq!(scene.shapes[0].0.downcast_ref::<Circle>(), Some(&Circle { radius: 2.0 }));
    assert!(scene.shapes[1].0.is_null());
    assert_eq!(scene.shapes[2].0.downcast_ref::<Square>(), Some(&Square { side: 1 }));
    assert_eq!(scene.tags["visible"].downcast_ref::<bool>(), Some(&true));
}

#[test]
fn test_unregistered_runtime_type() {
    let serializer = Serializer::new([Scene::type_info()]).unwrap();
    let scene = Scene {
        shapes: vec![Shape(Dynamic::new(Circle { radius: 1.0 }))],
        ..Default::default()
    };
    let err = serializer.encode_direct(&scene).unwrap_err();
    assert!(matches!(err, Error::UnregisteredType(name) if name.ends_with("Circle")));
}

#[derive(Debug, Default, PartialEq)]
struct Tree {
    children: Vec<Tree>,
    value: u32,
}

impl Reflect for Tree {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .field("value", |t| &t.value, |t| &mut t.value)
            .field("children", |t| &t.children, |t| &mut t.children)
            .build()
    }
}

fn tree(depth: u32) -> Tree {
    Tree {
        value: depth,
        children: (0..depth).map(|_| tree(depth - 1)).collect(),
    }
}

#[test]
fn test_recursive_type() {
    let serializer = Serializer::new([Tree::type_info()]).unwrap();
    let value = tree(4);
    let bytes = serializer.encode_direct(&value).unwrap();
    assert_eq!(serializer.decode_direct::<Tree>(bytes).unwrap(), value);

    // One routine each for Tree, Vec<Tree> and u32.
    for id in [2, 3, 4] {
        let descriptor = serializer.descriptor_by_id(id).unwrap();
        assert_eq!(descriptor.writer_generations(), 1);
        assert_eq!(descriptor.reader_generations(), 1);
    }
}

#[derive(Debug, Default, PartialEq)]
struct Expr {
    args: Vec<Arg>,
    op: String,
}

#[derive(Debug, Default, PartialEq)]
struct Arg {
    literal: Option<i64>,
    nested: Vec<Expr>,
}

impl Reflect for Expr {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .field("op", |e| &e.op, |e| &mut e.op)
            .field("args", |e| &e.args, |e| &mut e.args)
            .build()
    }
}

impl Reflect for Arg {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .value_type()
            .field("literal", |a| &a.literal, |a| &mut a.literal)
            .field("nested", |a| &a.nested, |a| &mut a.nested)
            .build()
    }
}

#[test]
fn test_mutually_recursive_types() {
    let serializer = Serializer::new([Expr::type_info()]).unwrap();
    let expr = Expr {
        op: "add".to_string(),
        args: vec![
            Arg {
                literal: Some(-1),
                nested: Vec::new(),
            },
            Arg {
                literal: None,
                nested: vec![Expr {
                    op: "neg".to_string(),
                    args: vec![Arg {
                        literal: Some(i64::MIN),
                        nested: Vec::new(),
                    }],
                }],
            },
        ],
    };
    let bytes = serializer.encode_direct(&expr).unwrap();
    assert_eq!(serializer.decode_direct::<Expr>(bytes).unwrap(), expr);
}

#[derive(Debug, Default, PartialEq)]
struct Base {
    zeta: u8,
    alpha: u8,
}

impl Reflect for Base {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .field("zeta", |b| &b.zeta, |b| &mut b.zeta)
            .field("alpha", |b| &b.alpha, |b| &mut b.alpha)
            .build()
    }
}

#[derive(Debug, Default, PartialEq)]
struct Derived {
    base: Base,
    beta: u8,
}

impl Reflect for Derived {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .base(|d| &d.base, |d| &mut d.base)
            .field("beta", |d| &d.beta, |d| &mut d.beta)
            .build()
    }
}

#[test]
fn test_base_fields_first() {
    let serializer = Serializer::new([Derived::type_info()]).unwrap();
    let value = Derived {
        base: Base { zeta: 2, alpha: 1 },
        beta: 3,
    };
    let bytes = serializer.encode_direct(&value).unwrap();
    assert_eq!(bytes.as_ref(), &[0x01, 0x02, 0x03]);
    assert_eq!(serializer.decode_direct::<Derived>(bytes).unwrap(), value);
}

#[derive(Default)]
struct Counter(u32);

impl Reflect for Counter {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .base(|c| &c.0, |c| &mut c.0)
            .build()
    }
}

#[test]
fn test_non_composite_base() {
    let err = Serializer::new([Counter::type_info()]).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

static SERIALIZING: AtomicUsize = AtomicUsize::new(0);
static SERIALIZED: AtomicUsize = AtomicUsize::new(0);
static DESERIALIZING: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Default, PartialEq)]
struct Invoice {
    quantity: u32,
    price: u32,
    total: u32,
}

impl Reflect for Invoice {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .field("quantity", |i| &i.quantity, |i| &mut i.quantity)
            .field("price", |i| &i.price, |i| &mut i.price)
            .on_serializing(|_| {
                SERIALIZING.fetch_add(1, Ordering::SeqCst);
            })
            .on_serialized(|_| {
                SERIALIZED.fetch_add(1, Ordering::SeqCst);
            })
            .on_deserializing(|invoice| {
                DESERIALIZING.fetch_add(1, Ordering::SeqCst);
                assert_eq!(invoice, &mut Invoice::default());
            })
            .on_deserialized(|invoice| invoice.total = invoice.quantity * invoice.price)
            .build()
    }
}

#[test]
fn test_lifecycle_hooks() {
    let config = Config {
        callbacks: true,
        ..Default::default()
    };
    let serializer = Serializer::with_config(config, [Invoice::type_info()]).unwrap();
    let invoice = Invoice {
        quantity: 3,
        price: 7,
        total: 0,
    };
    let bytes = serializer.encode_direct(&invoice).unwrap();
    assert_eq!(SERIALIZING.load(Ordering::SeqCst), 1);
    assert_eq!(SERIALIZED.load(Ordering::SeqCst), 1);

    let decoded: Invoice = serializer.decode_direct(bytes).unwrap();
    assert_eq!(DESERIALIZING.load(Ordering::SeqCst), 1);
    assert_eq!(decoded.total, 21);

    // Hooks are ignored unless enabled.
    let serializer = Serializer::new([Invoice::type_info()]).unwrap();
    let bytes = serializer.encode_direct(&invoice).unwrap();
    let decoded: Invoice = serializer.decode_direct(bytes).unwrap();
    assert_eq!(decoded.total, 0);
    assert_eq!(SERIALIZING.load(Ordering::SeqCst), 1);
}

#[derive(Default)]
struct Sample(u8);

impl Reflect for Sample {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .value_type()
            .field("0", |s| &s.0, |s| &mut s.0)
            .on_deserialized(|s| s.0 += 1)
            .build()
    }
}

#[test]
fn test_hooks_on_value_type() {
    let config = Config {
        callbacks: true,
        ..Default::default()
    };
    let err = Serializer::with_config(config, [Sample::type_info()]).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    // Without callbacks the hooks are never invoked, so the type is accepted.
    Serializer::new([Sample::type_info()]).unwrap();
}

/// Process-local state that is never serialized.
#[derive(Debug, Default, PartialEq)]
struct Cache(u64);

impl Reflect for Cache {
    fn type_info() -> TypeInfo {
        TypeInfo::opaque::<Self>().with_sealed(true)
    }
}

#[derive(Debug, Default, PartialEq)]
struct Session {
    cache: Cache,
    user: String,
}

impl Reflect for Session {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .field("cache", |s| &s.cache, |s| &mut s.cache)
            .field("user", |s| &s.user, |s| &mut s.user)
            .build()
    }
}

#[test]
fn test_noop_handler() {
    let err = Serializer::new([Session::type_info()]).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let config = Config {
        handlers: vec![Arc::new(NoOpHandler::default().with::<Cache>())],
        ..Default::default()
    };
    let serializer = Serializer::with_config(config, [Session::type_info()]).unwrap();
    assert!(serializer.descriptor::<Cache>().unwrap().is_direct());

    let session = Session {
        cache: Cache(42),
        user: "A".to_string(),
    };
    let bytes = serializer.encode_direct(&session).unwrap();
    assert_eq!(bytes.as_ref(), &[0x03, 0x01, 0x41]);
    let decoded: Session = serializer.decode_direct(bytes).unwrap();
    assert_eq!(
        decoded,
        Session {
            cache: Cache(0),
            user: "A".to_string(),
        }
    );
}

#[test]
fn test_custom_handler_precedence() {
    let config = Config {
        handlers: vec![Arc::new(NoOpHandler::new([u32::type_info()]))],
        ..Default::default()
    };
    let serializer = Serializer::with_config(config, [Vec::<u32>::type_info()]).unwrap();
    assert_eq!(serializer.descriptor::<u32>().unwrap().handler().name(), "noop");
    let bytes = serializer.encode_direct(&vec![1u32, 2, 3]).unwrap();
    assert_eq!(bytes.as_ref(), &[0x04]);
    assert_eq!(serializer.decode_direct::<Vec<u32>>(bytes).unwrap(), vec![0, 0, 0]);
}

#[derive(Debug, Default, PartialEq)]
struct Badge(u8);

impl Reflect for Badge {
    fn type_info() -> TypeInfo {
        TypeInfo::opaque::<Self>()
    }
}

/// Writes a badge as one byte, counting every routine invocation.
struct CountingHandler(Arc<AtomicUsize>);

impl Handler for CountingHandler {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn handles(&self, info: &TypeInfo) -> bool {
        info.id() == TypeId::of::<Badge>()
    }

    fn subtypes(&self, _: &TypeInfo) -> Vec<TypeInfo> {
        Vec::new()
    }

    fn codegen(&self) -> Codegen<'_> {
        Codegen::Static(self)
    }
}

impl StaticHandler for CountingHandler {
    fn writer(&self, _: &TypeInfo) -> Result<WriteFn, Error> {
        let calls = self.0.clone();
        Ok(Box::new(
            move |_: &Serializer, buf: &mut dyn BufMut, value: &dyn Any| -> Result<(), Error> {
                calls.fetch_add(1, Ordering::Relaxed);
                let badge = value
                    .downcast_ref::<Badge>()
                    .ok_or(Error::TypeMismatch("Badge"))?;
                buf.put_u8(badge.0);
                Ok(())
            },
        ))
    }

    fn reader(&self, _: &TypeInfo) -> Result<ReadFn, Error> {
        let calls = self.0.clone();
        Ok(Box::new(
            move |_: &Serializer, buf: &mut dyn Buf, slot: &mut dyn Any| -> Result<(), Error> {
                calls.fetch_add(1, Ordering::Relaxed);
                if !buf.has_remaining() {
                    return Err(Error::StreamTruncated);
                }
                let badge = slot
                    .downcast_mut::<Badge>()
                    .ok_or(Error::TypeMismatch("Badge"))?;
                badge.0 = buf.get_u8();
                Ok(())
            },
        ))
    }
}

#[test]
fn test_null_slot_skips_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = Config {
        handlers: vec![Arc::new(CountingHandler(calls.clone()))],
        ..Default::default()
    };
    let serializer =
        Serializer::with_config(config, [Scene::type_info(), Badge::type_info()]).unwrap();

    // Null slots are a single zero id, whatever type they usually hold.
    let scene = Scene {
        shapes: vec![Shape(Dynamic::null())],
        tags: HashMap::from([("badge".to_string(), Dynamic::null())]),
    };
    let bytes = serializer.encode(&Dynamic::new(scene)).unwrap();
    let scene = serializer.decode(bytes).unwrap().downcast::<Scene>().unwrap();
    assert!(scene.shapes[0].0.is_null());
    assert!(scene.tags["badge"].is_null());
    let bytes = serializer.encode(&Dynamic::null()).unwrap();
    assert_eq!(bytes.as_ref(), &[0x00]);
    assert!(serializer.decode(bytes).unwrap().is_null());
    assert_eq!(calls.load(Ordering::Relaxed), 0);

    // A present badge goes through the handler once each way.
    let scene = Scene {
        shapes: vec![Shape(Dynamic::new(Badge(7)))],
        ..Default::default()
    };
    let bytes = serializer.encode(&Dynamic::new(scene)).unwrap();
    let scene = serializer.decode(bytes).unwrap().downcast::<Scene>().unwrap();
    assert_eq!(scene.shapes[0].0.downcast_ref::<Badge>(), Some(&Badge(7)));
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}
