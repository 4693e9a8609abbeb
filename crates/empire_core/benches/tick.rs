//! Tick benchmarks for empire_core.
//!
//! Run with: `cargo bench -p empire_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use empire_core::tick::{run_tick, TickKind};
use empire_test_utils::fixtures::skirmish_world;

/// Ship ticks over galaxies of growing fleet size.
pub fn ship_tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("ship_tick");
    for per_side in [5u32, 25, 100] {
        let world = skirmish_world(per_side);
        group.bench_with_input(BenchmarkId::from_parameter(per_side * 4), &world, |b, world| {
            b.iter(|| run_tick(TickKind::Ship, black_box(world), 10, black_box(42)));
        });
    }
    group.finish();
}

/// Economy pass over the fixture planets.
pub fn planet_tick_benchmark(c: &mut Criterion) {
    let world = skirmish_world(1);
    c.bench_function("planet_tick", |b| {
        b.iter(|| run_tick(TickKind::Planet, black_box(&world), 30, black_box(7)));
    });
}

criterion_group!(benches, ship_tick_benchmark, planet_tick_benchmark);
criterion_main!(benches);
