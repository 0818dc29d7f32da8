use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use pipeweld::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_stage_chain(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("stage_chain");

    for size in [100u64, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size));

        for buffer in [1usize, 64].iter() {
            group.bench_with_input(
                BenchmarkId::new(format!("map_buffer_{}", buffer), size),
                size,
                |b, &size| {
                    b.to_async(&rt).iter(|| async move {
                        let pipeline = Pipeline::new().buffer_size(*buffer);
                        let source = pipeline.from_iter(0..size);
                        let doubled = pipeline.map("double", source, |x: u64| black_box(x * 2));
                        let tripled = pipeline.map("triple", doubled, |x: u64| x * 3);
                        count(tripled).await.unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_fan_in_out(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("fan_in_out");

    for inputs in [2usize, 8, 32].iter() {
        group.bench_with_input(BenchmarkId::new("merge", inputs), inputs, |b, &inputs| {
            b.to_async(&rt).iter(|| async move {
                let pipeline = Pipeline::new().buffer_size(16);
                let streams = (0..inputs).map(|_| pipeline.from_iter(0..1000u32)).collect();
                count(pipeline.merge(streams)).await.unwrap()
            });
        });
    }

    group.bench_function("tee_1000", |b| {
        b.to_async(&rt).iter(|| async {
            let pipeline = Pipeline::new().buffer_size(16);
            let (left, right) = pipeline.tee(pipeline.from_iter(0..1000u32));
            let (l, r) = tokio::join!(count(left), count(right));
            black_box(l.unwrap() + r.unwrap())
        });
    });

    group.bench_function("bridge_10x100", |b| {
        b.to_async(&rt).iter(|| async {
            let pipeline = Pipeline::new().buffer_size(16);
            let inner: Vec<_> = (0..10).map(|_| pipeline.from_iter(0..100u32)).collect();
            count(pipeline.bridge(pipeline.from_iter(inner))).await.unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_stage_chain, bench_fan_in_out);
criterion_main!(benches);
