//! Throughput benchmarks for the STM hot paths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orec_stm::Stm;
use std::sync::atomic::AtomicU64;

fn bench_read_txn(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_txn");

    let stm = Stm::new();
    let heap: Vec<AtomicU64> = (0..1024).map(|i| AtomicU64::new(i as u64)).collect();

    for reads in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*reads as u64));
        group.bench_with_input(BenchmarkId::from_parameter(reads), reads, |b, &reads| {
            b.iter(|| {
                let sum = stm.atomically(|tx| {
                    let mut sum = 0;
                    for w in heap.iter().take(reads) {
                        sum += tx.read(w)?;
                    }
                    Ok(sum)
                });
                black_box(sum);
            });
        });
    }

    group.finish();
}

fn bench_write_txn(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_txn");

    let stm = Stm::new();
    let heap: Vec<AtomicU64> = (0..1024).map(|_| AtomicU64::new(0)).collect();

    for writes in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*writes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(writes), writes, |b, &writes| {
            let mut round = 0u64;
            b.iter(|| {
                round += 1;
                stm.atomically(|tx| {
                    for w in heap.iter().take(writes) {
                        tx.write(w, round)?;
                    }
                    Ok(())
                });
            });
        });
    }

    group.finish();
}

fn bench_mixed_txn(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_txn");

    let stm = Stm::new();
    let heap: Vec<AtomicU64> = (0..1024).map(|_| AtomicU64::new(0)).collect();

    // Read-modify-write over a small working set, the common STM shape.
    group.bench_function("rmw_4", |b| {
        b.iter(|| {
            stm.atomically(|tx| {
                for w in heap.iter().take(4) {
                    let v = tx.read(w)?;
                    tx.write(w, v + 1)?;
                }
                Ok(())
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_read_txn, bench_write_txn, bench_mixed_txn);
criterion_main!(benches);
