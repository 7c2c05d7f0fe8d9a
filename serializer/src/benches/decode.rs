use super::{records, serializer, Record};
use criterion::{criterion_group, Criterion};

fn bench_decode(c: &mut Criterion) {
    let serializer = serializer();
    let encoded = serializer.encode_direct(&records()).unwrap().freeze();

    c.bench_function(&format!("{}/direct", module_path!()), |b| {
        b.iter(|| {
            let records: Vec<Record> = serializer.decode_direct(encoded.clone()).unwrap();
            assert_eq!(records.len(), super::RECORDS);
        });
    });

    // A fresh serializer generates its read routines on first use.
    c.bench_function(&format!("{}/cold", module_path!()), |b| {
        b.iter(|| {
            let serializer = super::serializer();
            let records: Vec<Record> = serializer.decode_direct(encoded.clone()).unwrap();
            assert_eq!(records.len(), super::RECORDS);
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_decode
}
