#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use commonware_serializer::{Dynamic, Reflect, Serializer, TypeInfo};
use libfuzzer_sys::fuzz_target;
use std::{collections::BTreeMap, sync::OnceLock};

#[derive(Arbitrary, Debug, Default, PartialEq)]
struct Record {
    id: u64,
    delta: i32,
    label: Option<String>,
    flags: Vec<bool>,
    tags: BTreeMap<String, u16>,
    children: Vec<Record>,
}

impl Reflect for Record {
    fn type_info() -> TypeInfo {
        TypeInfo::composite::<Self>()
            .field("id", |r| &r.id, |r| &mut r.id)
            .field("delta", |r| &r.delta, |r| &mut r.delta)
            .field("label", |r| &r.label, |r| &mut r.label)
            .field("flags", |r| &r.flags, |r| &mut r.flags)
            .field("tags", |r| &r.tags, |r| &mut r.tags)
            .field("children", |r| &r.children, |r| &mut r.children)
            .build()
    }
}

#[derive(Arbitrary, Debug)]
enum FuzzInput {
    Envelope(Vec<u8>),
    Direct(Vec<u8>),
    Record(Record),
    Integers(Vec<i64>, Vec<u64>),
    Strings(Vec<Option<String>>),
    Bytes(Vec<u8>),
    Chars(Vec<char>),
}

fn serializer() -> &'static Serializer {
    static SERIALIZER: OnceLock<Serializer> = OnceLock::new();
    SERIALIZER.get_or_init(|| {
        Serializer::new([
            Record::type_info(),
            Vec::<i64>::type_info(),
            Vec::<u64>::type_info(),
            Vec::<Option<String>>::type_info(),
            Bytes::type_info(),
            Vec::<char>::type_info(),
        ])
        .expect("types should register")
    })
}

fn round_trip<T: Reflect + PartialEq + std::fmt::Debug>(serializer: &Serializer, value: T) {
    let encoded = serializer.encode_direct(&value).expect("encode failed");
    let decoded = serializer.decode_direct::<T>(encoded).expect("decode failed");
    assert_eq!(decoded, value);

    let encoded = serializer.encode(&Dynamic::new(value)).expect("encode failed");
    let decoded = serializer.decode(encoded).expect("decode failed");
    assert!(decoded.downcast_ref::<T>().is_some());
}

fn fuzz(input: FuzzInput) {
    let serializer = serializer();
    match input {
        // Arbitrary bytes must never panic.
        FuzzInput::Envelope(data) => {
            let _ = serializer.decode(data.as_slice());
        }
        FuzzInput::Direct(data) => {
            let _ = serializer.decode_direct::<Record>(data.as_slice());
        }
        FuzzInput::Record(record) => round_trip(serializer, record),
        FuzzInput::Integers(signed, unsigned) => {
            round_trip(serializer, signed);
            round_trip(serializer, unsigned);
        }
        FuzzInput::Strings(strings) => round_trip(serializer, strings),
        FuzzInput::Bytes(bytes) => round_trip(serializer, Bytes::from(bytes)),
        FuzzInput::Chars(chars) => round_trip(serializer, chars),
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
