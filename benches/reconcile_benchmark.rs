use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{seq::SliceRandom, thread_rng, Rng};
use slot_orchestrator::{
    common_slot_ids, mock_service::MockReservationService, EngineConfig, Reconciler, Slot,
};
use std::time::Duration;

// Two listings drawn from the same id range, roughly half overlapping
fn random_listings(size: usize) -> (Vec<u64>, Vec<u64>) {
    let mut rng = thread_rng();
    let range = (size * 2) as u64;

    let mut first: Vec<u64> = (0..size).map(|_| rng.gen_range(0..range)).collect();
    let mut second: Vec<u64> = (0..size).map(|_| rng.gen_range(0..range)).collect();
    first.shuffle(&mut rng);
    second.shuffle(&mut rng);
    (first, second)
}

pub fn intersection_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("common_slot_ids");

    for size in [100, 1_000, 10_000].iter() {
        let (first, second) = random_listings(*size);
        let first: Vec<Slot> = first.into_iter().map(Slot::new).collect();
        let second: Vec<Slot> = second.into_iter().map(Slot::new).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(common_slot_ids(&first, &second, 20)));
        });
    }

    group.finish();
}

pub fn find_common_slots_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let (first, second) = random_listings(1_000);
    let hotel = MockReservationService::new("hotel").with_available(first);
    let band = MockReservationService::new("band").with_available(second);
    let engine = Reconciler::new(
        &hotel,
        &band,
        EngineConfig {
            settle_delay: Duration::ZERO,
            ..Default::default()
        },
    );

    c.bench_function("reconciler_find_common_slots", |b| {
        b.iter(|| black_box(runtime.block_on(engine.find_common_slots()).unwrap()))
    });
}

criterion_group!(benches, intersection_benchmark, find_common_slots_benchmark);
criterion_main!(benches);
