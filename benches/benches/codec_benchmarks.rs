use std::hint::black_box;

use blockbus::Encoding;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize)]
struct Order {
    id: u64,
    customer: String,
    items: Vec<Line>,
}

#[derive(Clone, Serialize, Deserialize)]
struct Line {
    sku: String,
    quantity: u32,
    price_cents: u64,
}

fn order(lines: usize) -> Order {
    Order {
        id: 42,
        customer: "customer-0042".into(),
        items: (0..lines)
            .map(|i| Line {
                sku: format!("sku-{i:05}"),
                quantity: (i % 7) as u32 + 1,
                price_cents: 199 * i as u64,
            })
            .collect(),
    }
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for lines in [1, 16, 256] {
        let value = order(lines);
        group.throughput(Throughput::Elements(lines as u64));
        for encoding in [Encoding::Json, Encoding::MessagePack] {
            group.bench_with_input(
                BenchmarkId::new(format!("{encoding:?}"), lines),
                &value,
                |b, value| b.iter(|| encoding.encode(black_box(value)).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for lines in [1, 16, 256] {
        let value = order(lines);
        group.throughput(Throughput::Elements(lines as u64));
        for encoding in [Encoding::Json, Encoding::MessagePack] {
            let bytes = encoding.encode(&value).unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("{encoding:?}"), lines),
                &bytes,
                |b, bytes| b.iter(|| encoding.decode::<Order>(black_box(bytes)).unwrap()),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
