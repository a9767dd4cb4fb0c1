use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lazybson::{Document, RawDocument, raw::read_document};

fn construct_deep_doc(depth: usize) -> Document {
    let mut doc = Document::new();
    doc.insert("value", 23i64);
    for _ in 0..depth {
        let mut outer = Document::new();
        outer.insert("value", doc);
        doc = outer;
    }
    doc
}

fn construct_broad_doc(size: usize) -> Document {
    let mut doc = Document::new();
    for i in 0..size {
        doc.insert(format!("key {}", i), "lorem ipsum");
    }
    doc
}

fn access_deep(c: &mut Criterion) {
    let mut group = c.benchmark_group("access-deep");
    for depth in [10, 100, 1000] {
        let inbytes = Bytes::from(construct_deep_doc(depth).encode_to_vec().unwrap());
        group.bench_with_input(BenchmarkId::new("lazy", depth), &inbytes, |b, inbytes| {
            b.iter(|| {
                let mut reader = read_document(inbytes.clone()).unwrap().reader();
                let mut value = reader.read("value").unwrap().unwrap().clone();
                while let Ok(mut nested) = value.read_document() {
                    value = nested.read("value").unwrap().unwrap().clone();
                }
                value.read_int64().unwrap();
            })
        });
        group.bench_with_input(BenchmarkId::new("eager", depth), &inbytes, |b, inbytes| {
            b.iter(|| {
                let doc = Document::decode_from_bytes(inbytes).unwrap();
                let mut doc = &doc;
                while let Ok(val) = doc.get_document("value") {
                    doc = val;
                }
                doc.get_i64("value").unwrap();
            })
        });
    }
    group.finish();
}

fn access_broad(c: &mut Criterion) {
    const SIZE: usize = 1000;
    let mut group = c.benchmark_group("access-broad");
    let inbytes = Bytes::from(construct_broad_doc(SIZE).encode_to_vec().unwrap());
    for (label, range) in [("first", 0..1), ("middle", SIZE / 2..SIZE / 2 + 10), ("last", SIZE - 50..SIZE)] {
        let keys_to_get: Vec<_> = range.map(|i| format!("key {}", i)).collect();
        group.bench_with_input(BenchmarkId::new("lazy", label), &keys_to_get, |b, keys| {
            b.iter(|| {
                let mut reader = read_document(inbytes.clone()).unwrap().reader();
                for key in keys {
                    reader.read(key).unwrap().unwrap().read_string().unwrap();
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("scan", label), &keys_to_get, |b, keys| {
            b.iter(|| {
                let doc = RawDocument::from_bytes(&inbytes).unwrap();
                for key in keys {
                    doc.get(key).unwrap().unwrap();
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("eager", label), &keys_to_get, |b, keys| {
            b.iter(|| {
                let doc = Document::decode_from_bytes(&inbytes).unwrap();
                for key in keys {
                    doc.get_str(key).unwrap();
                }
            })
        });
    }
    group.finish();
}

fn iter_broad(c: &mut Criterion) {
    const SIZE: usize = 1000;
    let mut group = c.benchmark_group("iter-broad");
    let inbytes = Bytes::from(construct_broad_doc(SIZE).encode_to_vec().unwrap());
    group.bench_function("raw", |b| {
        b.iter(|| {
            let doc = RawDocument::from_bytes(&inbytes).unwrap();
            assert_eq!(doc.iter().filter(Result::is_ok).count(), SIZE);
        })
    });
    group.bench_function("materialized", |b| {
        b.iter(|| {
            let mut reader = read_document(inbytes.clone()).unwrap().reader();
            reader.materialize().unwrap();
            assert_eq!(reader.len().unwrap(), SIZE);
        })
    });
    group.bench_function("eager", |b| {
        b.iter(|| {
            let doc = Document::decode_from_bytes(&inbytes).unwrap();
            assert_eq!(doc.iter().count(), SIZE);
        })
    });
    group.finish();
}

criterion_group!(benches, access_deep, access_broad, iter_broad);
criterion_main!(benches);
