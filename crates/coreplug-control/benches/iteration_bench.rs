use coreplug_control::{CoreController, Governor, PolicyState};
use coreplug_core::CoreId;
use coreplug_infra::SimulatedCpus;
use coreplug_telemetry::HotplugMetrics;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

fn bench_iteration(c: &mut Criterion) {
    let sim = Arc::new(SimulatedCpus::new(8));
    // Loads straddle the threshold so the ladder is exercised without
    // settling into a fixed state.
    for i in 0..8 {
        sim.set_load(CoreId(i), if i % 2 == 0 { 80 } else { 40 });
    }

    let mut group = c.benchmark_group("Control Loop");

    let policy = PolicyState::new(8);
    let mut controller =
        CoreController::new(sim.clone(), sim.clone(), Arc::new(HotplugMetrics::new()));
    controller.prime();
    group.bench_function("Controller iteration (8 cores)", |b| {
        b.iter(|| black_box(controller.run_iteration(&policy)));
    });

    let governor = Governor::new(
        PolicyState::new(8),
        sim.clone(),
        sim.clone(),
        Arc::new(HotplugMetrics::new()),
    );
    group.bench_function("Governor tick (8 cores)", |b| {
        b.iter(|| black_box(governor.tick()));
    });

    group.bench_function("Status snapshot", |b| {
        b.iter(|| black_box(governor.status()));
    });

    group.finish();
}

criterion_group!(benches, bench_iteration);
criterion_main!(benches);
