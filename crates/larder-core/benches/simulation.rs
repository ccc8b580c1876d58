//! Criterion benchmarks for the predictive simulator.
//!
//! Benchmarks:
//!   - run_to_completion for a small outpost (one converter, two draws)
//!   - run_to_completion for a station with many converters
//!   - one live processing tick for comparison
//!
//! Run with: cargo bench -p larder-core --bench simulation

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use larder_core::prelude::*;

fn outpost_job() -> SimulationJob {
    SimulationJob::new(3600.0, 10_000)
        .with_label("outpost")
        .with_pool("Snacks", 5_000.0, 10_000.0)
        .with_pool("Soil", 0.0, 10_000.0)
        .with_pool("Oxygen", 2_000.0, 10_000.0)
        .with_converter(
            SimConverter::new("Greenhouse")
                .with_input("Soil", 1.5)
                .with_output("Snacks", 1.0),
        )
        .with_consumption("Snacks", 3.0)
        .with_consumption("Oxygen", 0.5)
        .with_production("Soil", 3.0)
}

fn station_job() -> SimulationJob {
    let mut job = SimulationJob::new(3600.0, 10_000)
        .with_label("station")
        .with_pool("Ore", 50_000.0, 100_000.0)
        .with_pool("Food", 1_000.0, 100_000.0)
        .with_pool("Water", 1_000.0, 100_000.0)
        .with_consumption("Food", 12.0)
        .with_consumption("Water", 9.0);
    for i in 0..32 {
        job = job.with_converter(
            SimConverter::new(format!("Processor {}", i))
                .with_input("Ore", 0.5)
                .with_output("Food", 0.3)
                .with_output("Water", 0.25)
                .with_yield("Food", 4.0, 86_400.0),
        );
    }
    job
}

fn bench_run_to_completion(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_run");

    let outpost = outpost_job();
    group.bench_function("outpost", |b| {
        b.iter(|| black_box(outpost.clone().run_to_completion()));
    });

    let station = station_job();
    group.sample_size(20);
    group.bench_function("station_32_converters", |b| {
        b.iter(|| black_box(station.clone().run_to_completion()));
    });

    group.finish();
}

fn bench_live_tick(c: &mut Criterion) {
    let mut library = ResourceLibrary::new();
    library.define(ResourceDefinition::shared("Snacks"));
    library.define(ResourceDefinition::shared("Soil"));
    let mut engine = ProvisioningEngine::with_seed(Settings::default(), library, 1);
    let vessel = engine.add_vessel(
        VesselBuilder::new("Outpost")
            .with_pool("Snacks", 1.0e9, 1.0e9)
            .with_pool("Soil", 0.0, 1.0e9)
            .with_processor(
                ResourceProcessor::new("Snacks", 60.0)
                    .with_input(ResourceFlow::new("Snacks", 1.0))
                    .with_output(ResourceFlow::new("Soil", 1.0).depends_on("Snacks")),
            )
            .build(),
    );
    for i in 0..20 {
        engine.add_individual(Crewmember::new(format!("Crew {}", i), "Pilot"), Some(vessel));
    }

    c.bench_function("engine_update_one_cycle", |b| {
        b.iter(|| engine.update(black_box(60.0)));
    });
}

criterion_group!(benches, bench_run_to_completion, bench_live_tick);
criterion_main!(benches);
