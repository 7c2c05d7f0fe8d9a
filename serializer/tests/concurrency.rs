//! First use of types from many threads at once.

use bytes::{Buf, BufMut};
use commonware_serializer::{
    engine::Generator,
    handler::{Codegen, GeneratorHandler, Handler},
    routine::{ReadFn, WriteFn},
    varint, Config, Dynamic, Error, Reflect, Serializer, SerializerCache, TypeInfo,
};
use std::{
    any::{Any, TypeId},
    collections::HashSet,
    sync::Arc,
    thread,
    time::Duration,
};

const THREADS: usize = 8;
const ROUNDS: usize = 16;

#[derive(Debug, Default, PartialEq)]
struct Wrapper<const N: u8> {
    label: String,
    next: Vec<Wrapper<N>>,
    value: u32,
}

impl<const N: u8> Reflect for Wrapper<N> {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .field("label", |w| &w.label, |w| &mut w.label)
            .field("next", |w| &w.next, |w| &mut w.next)
            .field("value", |w| &w.value, |w| &mut w.value)
            .build()
    }
}

fn wrapper<const N: u8>(value: u32) -> Wrapper<N> {
    Wrapper {
        label: format!("wrapper-{N}"),
        next: vec![Wrapper {
            value: value + 1,
            ..Default::default()
        }],
        value,
    }
}

fn round_trip<const N: u8>(serializer: &Serializer, value: u32) {
    let expected = wrapper::<N>(value);
    let bytes = serializer.encode_direct(&expected).unwrap();
    assert_eq!(serializer.decode_direct::<Wrapper<N>>(bytes).unwrap(), expected);

    let bytes = serializer.encode(&Dynamic::new(wrapper::<N>(value))).unwrap();
    let decoded = serializer.decode(bytes).unwrap().downcast::<Wrapper<N>>().unwrap();
    assert_eq!(decoded, expected);
}

fn roots() -> Vec<TypeInfo> {
    vec![
        Wrapper::<0>::type_info(),
        Wrapper::<1>::type_info(),
        Wrapper::<2>::type_info(),
        Wrapper::<3>::type_info(),
        Wrapper::<4>::type_info(),
        Wrapper::<5>::type_info(),
        Wrapper::<6>::type_info(),
        Wrapper::<7>::type_info(),
    ]
}

#[test]
fn test_concurrent_first_use() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let serializer = Serializer::new(roots()).unwrap();
    for descriptor in serializer.registry().descriptors() {
        if descriptor.id() != 1 {
            assert!(descriptor.writer().is_none(), "{}", descriptor.name());
        }
    }

    thread::scope(|s| {
        for t in 0..THREADS {
            let serializer = &serializer;
            s.spawn(move || {
                // Each thread walks the types in a different order.
                for round in 0..ROUNDS {
                    let value = (t * ROUNDS + round) as u32;
                    match (t + round) % 8 {
                        0 => round_trip::<0>(serializer, value),
                        1 => round_trip::<1>(serializer, value),
                        2 => round_trip::<2>(serializer, value),
                        3 => round_trip::<3>(serializer, value),
                        4 => round_trip::<4>(serializer, value),
                        5 => round_trip::<5>(serializer, value),
                        6 => round_trip::<6>(serializer, value),
                        _ => round_trip::<7>(serializer, value),
                    }
                }
            });
        }
    });

    // Every type got exactly one routine of each kind.
    for descriptor in serializer.registry().descriptors() {
        assert_eq!(descriptor.writer_generations(), 1, "{}", descriptor.name());
        assert_eq!(descriptor.reader_generations(), 1, "{}", descriptor.name());
    }
}

#[test]
fn test_concurrent_routines_shared() {
    let serializer = Serializer::new(roots()).unwrap();
    let writers = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    round_trip::<3>(&serializer, 3);
                    serializer.descriptor::<Wrapper<3>>().unwrap().writer().unwrap().clone()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });
    for writer in &writers[1..] {
        assert!(Arc::ptr_eq(&writers[0], writer));
    }

    // Types outside the closure of Wrapper<3> stay untouched.
    let untouched = serializer.descriptor::<Wrapper<4>>().unwrap();
    assert_eq!(untouched.writer_generations(), 0);
    assert_eq!(untouched.reader_generations(), 0);
}

#[test]
fn test_concurrent_registration() {
    let serializer = Serializer::new([]).unwrap();
    thread::scope(|s| {
        for root in roots() {
            let serializer = &serializer;
            s.spawn(move || serializer.add_types([root]).unwrap());
        }
    });

    // Ids are unique and contiguous whatever the interleaving.
    let map = serializer.type_map();
    let ids: HashSet<u32> = map.iter().map(|(_, id)| id).collect();
    assert_eq!(ids.len(), map.len());
    assert_eq!(ids, (1..=map.len() as u32).collect());
    round_trip::<5>(&serializer, 5);
}

#[test]
fn test_cache_shared_across_threads() {
    let cache = SerializerCache::default();
    thread::scope(|s| {
        for value in 0..THREADS as u32 {
            let cache = &cache;
            s.spawn(move || {
                let typed = cache.typed::<Wrapper<0>>().unwrap();
                let expected = wrapper::<0>(value);
                let bytes = typed.encode(&expected).unwrap();
                assert_eq!(typed.decode(bytes).unwrap(), expected);
            });
        }
    });
    assert_eq!(cache.len(), 1);
}

/// A value type whose routine bodies take a while to build.
#[derive(Debug, Default, PartialEq)]
struct Slow(u32);

impl Reflect for Slow {
    fn type_info() -> TypeInfo {
        TypeInfo::opaque::<Self>().with_value_type(true)
    }
}

#[derive(Debug, Default, PartialEq)]
struct Holder {
    slow: Slow,
    tag: u8,
}

impl Reflect for Holder {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .field("slow", |h| &h.slow, |h| &mut h.slow)
            .field("tag", |h| &h.tag, |h| &mut h.tag)
            .build()
    }
}

const BUILD_DELAY: Duration = Duration::from_millis(300);

struct SlowHandler;

impl Handler for SlowHandler {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn handles(&self, info: &TypeInfo) -> bool {
        info.id() == TypeId::of::<Slow>()
    }

    fn subtypes(&self, _: &TypeInfo) -> Vec<TypeInfo> {
        Vec::new()
    }

    fn codegen(&self) -> Codegen<'_> {
        Codegen::Generator(self)
    }
}

impl GeneratorHandler for SlowHandler {
    fn build_writer(&self, _: &Generator<'_>, _: &TypeInfo) -> Result<WriteFn, Error> {
        thread::sleep(BUILD_DELAY);
        Ok(Box::new(
            |_: &Serializer, buf: &mut dyn BufMut, value: &dyn Any| -> Result<(), Error> {
                let value = value
                    .downcast_ref::<Slow>()
                    .ok_or(Error::TypeMismatch("Slow"))?;
                varint::write(value.0, buf);
                Ok(())
            },
        ))
    }

    fn build_reader(&self, _: &Generator<'_>, _: &TypeInfo) -> Result<ReadFn, Error> {
        thread::sleep(BUILD_DELAY);
        Ok(Box::new(
            |_: &Serializer, buf: &mut dyn Buf, slot: &mut dyn Any| -> Result<(), Error> {
                let slot = slot
                    .downcast_mut::<Slow>()
                    .ok_or(Error::TypeMismatch("Slow"))?;
                slot.0 = varint::read(buf)?;
                Ok(())
            },
        ))
    }
}

#[test]
fn test_concurrent_first_use_waits_for_closure() {
    let config = Config {
        handlers: vec![Arc::new(SlowHandler)],
        ..Default::default()
    };
    let serializer = Serializer::with_config(config, [Holder::type_info()]).unwrap();
    assert!(serializer.descriptor::<Slow>().unwrap().is_direct());

    // Later threads arrive while the first is still building the body of Slow.
    thread::scope(|s| {
        for t in 0..4u32 {
            let serializer = &serializer;
            s.spawn(move || {
                thread::sleep(BUILD_DELAY / 4 * t);
                let expected = Holder {
                    slow: Slow(t + 300),
                    tag: t as u8,
                };
                let bytes = serializer.encode_direct(&expected).unwrap();
                let decoded: Holder = serializer.decode_direct(bytes).unwrap();
                assert_eq!(decoded, expected);
            });
        }
    });

    for descriptor in [
        serializer.descriptor::<Holder>().unwrap(),
        serializer.descriptor::<Slow>().unwrap(),
    ] {
        assert!(descriptor.published_writer().unwrap().is_bound());
        assert!(descriptor.published_reader().unwrap().is_bound());
        assert_eq!(descriptor.writer_generations(), 1);
        assert_eq!(descriptor.reader_generations(), 1);
    }
}
