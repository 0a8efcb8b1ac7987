//! Benchmarks for the hot paths: tracked reads, triggered writes, and
//! batched flushes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use prism_core::reactive::{EffectOptions, Obj, Runtime, Value};

fn bench_untracked_get(c: &mut Criterion) {
    let rt = Runtime::new();
    let state = rt.reactive(Obj::map().with("n", 1));

    c.bench_function("untracked_get", |b| {
        b.iter(|| black_box(state.get("n")));
    });
}

fn bench_triggered_write(c: &mut Criterion) {
    let rt = Runtime::new();
    let state = rt.reactive(Obj::map().with("n", 0i64));

    let observed = state.clone();
    let _effect = rt.effect(move || {
        observed.get("n");
    });

    c.bench_function("write_with_one_dependent", |b| {
        let mut i = 0i64;
        b.iter(|| {
            i += 1;
            state.set("n", i).unwrap();
        });
    });
}

fn bench_wide_fanout(c: &mut Criterion) {
    let rt = Runtime::new();
    let state = rt.reactive(Obj::map().with("n", 0i64));

    let mut effects = Vec::new();
    for _ in 0..100 {
        let observed = state.clone();
        effects.push(rt.effect(move || {
            observed.get("n");
        }));
    }

    c.bench_function("write_with_100_dependents", |b| {
        let mut i = 0i64;
        b.iter(|| {
            i += 1;
            state.set("n", i).unwrap();
        });
    });
}

fn bench_batched_flush(c: &mut Criterion) {
    let rt = Runtime::new();
    let state = rt.reactive(Obj::map().with("n", 0i64));

    let observed = state.clone();
    let _effect = rt.effect_with(
        move || {
            observed.get("n");
            Value::Null
        },
        EffectOptions {
            lazy: false,
            scheduler: Some(rt.queue_scheduler()),
        },
    );

    c.bench_function("100_writes_one_flush", |b| {
        let mut i = 0i64;
        b.iter(|| {
            for _ in 0..100 {
                i += 1;
                state.set("n", i).unwrap();
            }
            rt.flush_jobs();
        });
    });
}

fn bench_computed_read(c: &mut Criterion) {
    let rt = Runtime::new();
    let state = rt.reactive(Obj::map().with("n", 1i64));

    let observed = state.clone();
    let doubled = rt.computed(move || Value::Int(observed.get("n").as_int().unwrap_or(0) * 2));
    doubled.value();

    c.bench_function("computed_cached_read", |b| {
        b.iter(|| black_box(doubled.value()));
    });
}

criterion_group!(
    benches,
    bench_untracked_get,
    bench_triggered_write,
    bench_wide_fanout,
    bench_batched_flush,
    bench_computed_read,
);
criterion_main!(benches);
