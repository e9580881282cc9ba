// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Resolution microbenchmarks.
//!
//! Runs the standard scenario matrix under criterion, in-process, as a quick
//! cross-check of the fork-isolated runner.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resolvebench_benchmark::{Fixture, ScenarioMatrix, ScenarioTarget};
use resolvebench_core::BenchConfig;
use std::time::Duration;

/// Local entry counts of the isolated topologies.
const REPOSITORY_SIZES: &[usize] = &[0, 50, 100];

/// One group per topology with its hit and miss side by side.
fn bench_resolve(c: &mut Criterion) {
    let config = BenchConfig {
        repository_sizes: REPOSITORY_SIZES.to_vec(),
        ..BenchConfig::default()
    };
    let fixture = Fixture::build(&config).expect("Failed to build fixture");
    let matrix = ScenarioMatrix::standard(REPOSITORY_SIZES).expect("Invalid matrix");

    for topology in matrix.topologies() {
        let mut group = c.benchmark_group(format!("resolve_{}", topology));
        group.measurement_time(Duration::from_secs(3));

        for scenario in matrix
            .iter()
            .filter(|s| s.target == ScenarioTarget::Resolver(topology))
        {
            let probe = fixture.probe(scenario).expect("Unbound scenario");
            probe
                .verify(scenario, "criterion setup")
                .expect("Scenario outcome differs from expectation");

            group.bench_with_input(
                BenchmarkId::from_parameter(scenario.expected),
                &probe,
                |b, probe| b.iter(|| black_box(probe.invoke())),
            );
        }

        group.finish();
    }
}

/// Direct acquisition of the reference artifact: the floor.
fn bench_baseline(c: &mut Criterion) {
    let config = BenchConfig {
        repository_sizes: vec![0],
        ..BenchConfig::default()
    };
    let fixture = Fixture::build(&config).expect("Failed to build fixture");
    let matrix = ScenarioMatrix::standard(&config.repository_sizes).expect("Invalid matrix");
    let baseline = matrix
        .iter()
        .find(|s| s.is_baseline())
        .expect("Standard matrix has a baseline");
    let probe = fixture.probe(baseline).expect("Unbound baseline");

    c.bench_function("baseline", |b| b.iter(|| black_box(probe.invoke())));
}

criterion_group!(benches, bench_resolve, bench_baseline);
criterion_main!(benches);
