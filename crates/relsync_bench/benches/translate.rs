//! Record translation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relsync_bench::{populated_store, task_payload};
use relsync_engine::{ChangeTranslator, SyncConfig};
use relsync_store::Record;
use relsync_testkit::fixtures::TASK;

/// Benchmark encoding a local record.
fn bench_to_remote(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_remote");
    let config = SyncConfig::new("bench-user", "device-a");

    for tags in [0usize, 8, 64].iter() {
        group.throughput(Throughput::Elements(*tags as u64 + 1));
        group.bench_with_input(BenchmarkId::from_parameter(tags), tags, |b, &tags| {
            let (store, task) = populated_store(tags);
            let translator = ChangeTranslator::new(&store, &config);

            b.iter(|| {
                let payload = translator.to_remote(black_box(&task)).unwrap();
                black_box(payload);
            });
        });
    }
    group.finish();
}

/// Benchmark applying a remote payload to a new record.
fn bench_apply_remote(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_remote");
    let config = SyncConfig::new("bench-user", "device-a");

    for tags in [0usize, 8, 64].iter() {
        group.throughput(Throughput::Elements(*tags as u64 + 1));
        group.bench_with_input(BenchmarkId::from_parameter(tags), tags, |b, &tags| {
            let (store, _) = populated_store(tags);
            let translator = ChangeTranslator::new(&store, &config);
            let payload = task_payload(tags);

            b.iter(|| {
                let mut record = Record::new(TASK);
                let applied = translator
                    .apply_remote(&mut record, black_box(&payload))
                    .unwrap();
                black_box((record, applied));
            });
        });
    }
    group.finish();
}

/// Benchmark applying a payload whose relationship targets are unknown.
fn bench_apply_with_placeholders(c: &mut Criterion) {
    let config = SyncConfig::new("bench-user", "device-a");
    let (store, _) = populated_store(0);
    let translator = ChangeTranslator::new(&store, &config);
    let payload = task_payload(16);

    c.bench_function("apply_remote_placeholders_16", |b| {
        b.iter(|| {
            let mut record = Record::new(TASK);
            let applied = translator
                .apply_remote(&mut record, black_box(&payload))
                .unwrap();
            black_box(applied);
        });
    });
}

criterion_group!(
    benches,
    bench_to_remote,
    bench_apply_remote,
    bench_apply_with_placeholders,
);

criterion_main!(benches);
