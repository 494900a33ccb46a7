//! End-to-end sync benchmarks over the in-memory collaborators.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relsync_store::{LocalStore, WriteBatch};
use relsync_testkit::fixtures::task;
use relsync_testkit::integration::TwoDeviceHarness;

/// Benchmark one insert propagating to a second device.
fn bench_single_insert(c: &mut Criterion) {
    let harness = TwoDeviceHarness::observing();

    c.bench_function("propagate_insert", |b| {
        b.iter(|| {
            let created = harness.a.insert(black_box(task("Propagated")));
            black_box(created);
        });
    });
}

/// Benchmark batches of inserts propagating to a second device.
fn bench_batch_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate_batch");

    for count in [10usize, 100].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let harness = TwoDeviceHarness::observing();

            b.iter(|| {
                let mut batch = WriteBatch::new();
                for n in 0..count {
                    batch = batch.insert(task(&format!("Task {n}")));
                }
                harness.a.store.commit(black_box(batch)).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_insert, bench_batch_insert);

criterion_main!(benches);
