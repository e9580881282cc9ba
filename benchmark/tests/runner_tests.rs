// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end runner tests.
//!
//! These drive complete runs through the public API, from configuration to
//! the finished report.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use resolvebench_benchmark::fixture::IntegrityError;
use resolvebench_benchmark::fork::{ForkError, ForkFailure, ForkOutcome};
use resolvebench_benchmark::{
    check_floor, check_scan_monotonic, BenchmarkRunner, EntryStatus, ForkExecutor, InProcessExecutor, JsonReporter,
    ProcessForkExecutor, RunError, Scenario, ScenarioMatrix,
};
use resolvebench_core::{BenchConfig, RunState};
use tempfile::TempDir;

fn test_config() -> BenchConfig {
    BenchConfig {
        forks: 2,
        warmup_iterations: 1,
        measurement_iterations: 3,
        batch_size: 10,
        fork_retries: 0,
        ..BenchConfig::default()
    }
}

/// Loses every fork whose index is in `lost`.
struct LossyExecutor {
    inner: InProcessExecutor,
    lost: Vec<u32>,
    calls: Arc<AtomicU32>,
}

impl LossyExecutor {
    fn new(config: &BenchConfig, lost: Vec<u32>) -> Self {
        Self {
            inner: InProcessExecutor::new(config.clone()),
            lost,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl ForkExecutor for LossyExecutor {
    async fn run_fork(&self, scenario: &Scenario, fork: u32) -> Result<ForkOutcome, ForkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.lost.contains(&fork) {
            return Err(ForkFailure::Crashed {
                scenario: scenario.name.clone(),
                fork,
                reason: "killed by SIGKILL".to_string(),
            }
            .into());
        }
        self.inner.run_fork(scenario, fork).await
    }
}

/// Reports an integrity failure from the first fork of one scenario.
struct TamperedExecutor {
    inner: InProcessExecutor,
    tampered: &'static str,
}

impl ForkExecutor for TamperedExecutor {
    async fn run_fork(&self, scenario: &Scenario, fork: u32) -> Result<ForkOutcome, ForkError> {
        if scenario.name == self.tampered {
            return Err(IntegrityError::Reported {
                scenario: scenario.name.clone(),
                fork,
                message: "expected miss, observed hit".to_string(),
            }
            .into());
        }
        self.inner.run_fork(scenario, fork).await
    }
}

#[tokio::test]
async fn test_full_run_reports_every_scenario_in_order() {
    let config = test_config();
    let matrix = ScenarioMatrix::standard(&config.repository_sizes).unwrap();
    let mut runner =
        BenchmarkRunner::new(config.clone(), matrix, InProcessExecutor::new(config));

    let outcome = runner.run().await.unwrap();
    assert!(outcome.complete);
    assert_eq!(runner.state(), RunState::Done);

    let names: Vec<_> = outcome
        .report
        .entries
        .iter()
        .map(|e| e.scenario_name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "baseline",
            "load_existing_context",
            "load_unknown_context",
            "load_existing_isolated_0",
            "load_unknown_isolated_0",
            "load_existing_isolated_50",
            "load_unknown_isolated_50",
            "load_existing_isolated_100",
            "load_unknown_isolated_100",
        ]
    );

    for entry in &outcome.report.entries {
        assert_eq!(entry.status, EntryStatus::Measured);
        assert_eq!(entry.sample_count, 2 * 3);
        assert_eq!(entry.invocations, 2 * 3 * 10);
        assert_eq!(entry.forks_completed, 2);
        assert_eq!(entry.forks_failed, 0);
        assert!(entry.average_time.is_some());
    }
}

#[tokio::test]
async fn test_measured_run_keeps_baseline_below_resolution() {
    let config = BenchConfig {
        warmup_iterations: 2,
        measurement_iterations: 5,
        batch_size: 200,
        ..test_config()
    };
    let matrix = ScenarioMatrix::standard(&config.repository_sizes).unwrap();
    let mut runner =
        BenchmarkRunner::new(config.clone(), matrix, InProcessExecutor::new(config));

    let outcome = runner.run().await.unwrap();
    assert!(outcome.complete);
    assert_eq!(outcome.report.entries.len(), 9);
    assert!(outcome.report.entries.iter().all(|e| e.is_measured()));

    let violations = check_floor(&outcome.report);
    assert!(violations.is_empty(), "floor violated: {:?}", violations);

    // Generous tolerance: this only catches a scan that got skipped.
    let violations = check_scan_monotonic(&outcome.report, 0.5);
    assert!(violations.is_empty(), "scan cost dropped: {:?}", violations);
}

#[tokio::test]
async fn test_report_survives_save_and_load() {
    let config = BenchConfig {
        forks: 1,
        repository_sizes: vec![0],
        ..test_config()
    };
    let matrix = ScenarioMatrix::standard(&config.repository_sizes).unwrap();
    let mut runner =
        BenchmarkRunner::new(config.clone(), matrix, InProcessExecutor::new(config));
    let outcome = runner.run().await.unwrap();

    let temp_dir = TempDir::new().unwrap();
    let reporter = JsonReporter::new(temp_dir.path()).unwrap();
    let path = reporter.save(&outcome.report).unwrap();

    let loaded = JsonReporter::load(&path).unwrap();
    assert_eq!(loaded.run_id, outcome.report.run_id);
    assert_eq!(loaded.entries.len(), 5);
    assert_eq!(loaded.config.repository_sizes, vec![0]);
}

#[tokio::test]
async fn test_fixture_failure_aborts_without_report() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("occupied");
    std::fs::write(&file, "").unwrap();

    let config = BenchConfig {
        fixture_dir: Some(file),
        ..test_config()
    };
    let matrix = ScenarioMatrix::standard(&config.repository_sizes).unwrap();
    let executor = LossyExecutor::new(&config, Vec::new());
    let mut runner = BenchmarkRunner::new(config, matrix, executor);

    let err = runner.run().await.unwrap_err();
    assert!(matches!(err, RunError::Fixture(_)));
    assert_eq!(runner.state(), RunState::Failed);
}

#[tokio::test]
async fn test_fixture_failure_spawns_no_forks() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("occupied");
    std::fs::write(&file, "").unwrap();

    let config = BenchConfig {
        fixture_dir: Some(file),
        ..test_config()
    };
    let matrix = ScenarioMatrix::standard(&config.repository_sizes).unwrap();
    let executor = LossyExecutor::new(&config, Vec::new());
    let calls = Arc::clone(&executor.calls);
    let mut runner = BenchmarkRunner::new(config, matrix, executor);

    assert!(runner.run().await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_integrity_failure_in_fork_aborts_run() {
    let config = test_config();
    let matrix = ScenarioMatrix::standard(&config.repository_sizes).unwrap();
    let executor = TamperedExecutor {
        inner: InProcessExecutor::new(config.clone()),
        tampered: "load_unknown_isolated_50",
    };
    let mut runner = BenchmarkRunner::new(config, matrix, executor);

    let err = runner.run().await.unwrap_err();
    match err {
        RunError::Integrity(IntegrityError::Reported { scenario, fork, .. }) => {
            assert_eq!(scenario, "load_unknown_isolated_50");
            assert_eq!(fork, 0);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(runner.state(), RunState::Failed);
}

#[tokio::test]
async fn test_lost_forks_reduce_sample_count() {
    let config = BenchConfig {
        forks: 3,
        repository_sizes: vec![0],
        ..test_config()
    };
    let matrix = ScenarioMatrix::standard(&config.repository_sizes).unwrap();
    let executor = LossyExecutor::new(&config, vec![1]);
    let mut runner = BenchmarkRunner::new(config, matrix, executor);

    let outcome = runner.run().await.unwrap();
    assert!(outcome.complete);
    for entry in &outcome.report.entries {
        assert_eq!(entry.status, EntryStatus::Measured);
        assert_eq!(entry.forks_completed, 2);
        assert_eq!(entry.forks_failed, 1);
        assert_eq!(entry.sample_count, 2 * 3);
    }
}

#[tokio::test]
async fn test_lost_forks_are_retried() {
    let config = BenchConfig {
        forks: 2,
        fork_retries: 2,
        repository_sizes: vec![0],
        ..test_config()
    };
    let matrix = ScenarioMatrix::from_scenarios(vec![Scenario::baseline().unwrap()]).unwrap();
    let executor = LossyExecutor::new(&config, vec![0]);
    let calls = Arc::clone(&executor.calls);
    let mut runner = BenchmarkRunner::new(config, matrix, executor);

    let outcome = runner.run().await.unwrap();
    assert_eq!(outcome.report.entries[0].forks_failed, 1);
    assert_eq!(outcome.report.entries[0].forks_completed, 1);
    // Fork 0: three attempts, fork 1: one.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_all_forks_lost_marks_insufficient() {
    let config = BenchConfig {
        repository_sizes: vec![0],
        ..test_config()
    };
    let matrix = ScenarioMatrix::standard(&config.repository_sizes).unwrap();
    let executor = LossyExecutor::new(&config, vec![0, 1]);
    let mut runner = BenchmarkRunner::new(config, matrix, executor);

    let outcome = runner.run().await.unwrap();
    assert!(!outcome.complete);
    assert_eq!(outcome.report.entries.len(), 5);
    for entry in &outcome.report.entries {
        assert_eq!(entry.status, EntryStatus::Insufficient);
        assert_eq!(entry.sample_count, 0);
        assert!(entry.average_time.is_none());
    }
    assert!(check_floor(&outcome.report).is_empty());
}

#[tokio::test]
async fn test_process_isolation_end_to_end() {
    let config = BenchConfig {
        forks: 1,
        repository_sizes: vec![0],
        ..test_config()
    };
    let matrix = ScenarioMatrix::standard(&config.repository_sizes)
        .unwrap()
        .filter(&["baseline", "load_unknown_context"]);
    let executor =
        ProcessForkExecutor::new(env!("CARGO_BIN_EXE_run_benchmarks"), &config).unwrap();
    let mut runner = BenchmarkRunner::new(config, matrix, executor);

    let outcome = runner.run().await.unwrap();
    assert!(outcome.complete);
    let names: Vec<_> = outcome
        .report
        .entries
        .iter()
        .map(|e| e.scenario_name.as_str())
        .collect();
    assert_eq!(names, vec!["baseline", "load_unknown_context"]);
    for entry in &outcome.report.entries {
        assert_eq!(entry.forks_completed, 1);
        assert_eq!(entry.sample_count, 3);
    }
}
