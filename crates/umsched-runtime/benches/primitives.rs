//! Microbenchmarks for the scheduling primitives.
//!
//! Measures the hot control-plane paths in isolation:
//! - Registry add/find/remove (per-entry locking, tombstone removal)
//! - Semaphore release/acquire with permits available
//! - Wait point grant/consume without contention
//!
//! Run: `cargo bench --bench primitives`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use umsched_core::id::ElemId;
use umsched_core::InterruptFlag;
use umsched_runtime::parking::{ContextParking, PlatformWaitPoint};
use umsched_runtime::registry::IdRegistry;
use umsched_runtime::sync::Semaphore;

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("add_remove", |b| {
        let reg: IdRegistry<ElemId, u64> = IdRegistry::new();
        let mut next = 0u32;
        b.iter(|| {
            let id = ElemId::new(next);
            next = next.wrapping_add(1);
            reg.add(id, 42).unwrap();
            std::hint::black_box(reg.remove(id).unwrap());
        });
    });

    // Lookup cost against a populated index
    for &size in &[16usize, 1_024] {
        let reg: IdRegistry<ElemId, u64> = IdRegistry::new();
        for i in 0..size {
            reg.add(ElemId::new(i as u32), i as u64).unwrap();
        }
        let probe = ElemId::new((size / 2) as u32);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("find", size), &probe, |b, &probe| {
            b.iter(|| {
                let guard = reg.find(probe).unwrap();
                std::hint::black_box(*guard);
            });
        });

        group.bench_with_input(BenchmarkId::new("with_write", size), &probe, |b, &probe| {
            b.iter(|| {
                reg.with_write(probe, |v| {
                    *v = v.wrapping_add(1);
                })
                .unwrap();
            });
        });
    }

    group.finish();
}

fn bench_semaphore(c: &mut Criterion) {
    let mut group = c.benchmark_group("semaphore");

    group.bench_function("release_acquire", |b| {
        let sem = Semaphore::new(0);
        let flag = InterruptFlag::dummy();
        b.iter(|| {
            sem.release(1);
            sem.acquire_interruptible(&flag).unwrap();
        });
    });

    group.bench_function("try_acquire_hit", |b| {
        let sem = Semaphore::new(1);
        b.iter(|| {
            assert!(sem.try_acquire());
            sem.release(1);
        });
    });

    group.bench_function("try_acquire_miss", |b| {
        let sem = Semaphore::new(0);
        b.iter(|| {
            std::hint::black_box(sem.try_acquire());
        });
    });

    group.finish();
}

fn bench_wait_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("wait_point");

    // Permit already granted: measures the fast path a resumed thread
    // takes without entering the kernel
    group.bench_function("grant_then_wait", |b| {
        let point = PlatformWaitPoint::new();
        b.iter(|| {
            point.grant();
            point.wait();
        });
    });

    group.bench_function("grant_only", |b| {
        let point = PlatformWaitPoint::new();
        b.iter(|| {
            point.grant();
        });
        point.reset();
    });

    group.finish();
}

criterion_group!(benches, bench_registry, bench_semaphore, bench_wait_point);
criterion_main!(benches);
