//! Micro-benchmarks for the lock and channel fast paths.

use criterion::{criterion_group, criterion_main, Criterion};
use goro_core::id::CoroId;
use goro_core::SpinLock;
use goro_runtime::sync::Channel;

fn bench_spinlock(c: &mut Criterion) {
    let lock = SpinLock::new(0u64);
    c.bench_function("spinlock_lock_unlock", |b| {
        b.iter(|| {
            let mut g = lock.lock();
            *g = g.wrapping_add(1);
        })
    });
}

fn bench_channel_try_ops(c: &mut Criterion) {
    let ch: Channel<u64> = Channel::new(1024);
    c.bench_function("channel_try_push_pop", |b| {
        b.iter(|| {
            ch.try_push(42).unwrap();
            ch.try_pop().unwrap();
        })
    });
}

fn bench_coro_id_pack(c: &mut Criterion) {
    c.bench_function("coro_id_pack_unpack", |b| {
        b.iter(|| {
            let id = CoroId::new(12345, 678);
            criterion::black_box(id.slot() as u64 + id.generation() as u64)
        })
    });
}

criterion_group!(
    benches,
    bench_spinlock,
    bench_channel_try_ops,
    bench_coro_id_pack
);
criterion_main!(benches);
