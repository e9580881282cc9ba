// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark runner.
//!
//! Drives the run state machine: setup and integrity preflight, then each
//! scenario strictly in sequence, each fork strictly in sequence, then one
//! report entry per scenario in matrix order.

use resolvebench_core::{BenchConfig, RunState, RunStateMachine, StateTransitionError};
use thiserror::Error;

use crate::fixture::{Fixture, FixtureError, IntegrityError};
use crate::fork::{ForkError, ForkExecutor, ForkFailure, ForkOutcome};
use crate::metrics::{BenchmarkReport, ReportEntry, SampleAggregate};
use crate::scenario::{Scenario, ScenarioMatrix};

/// Fatal run errors. No report is produced.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Setup failed: {0}")]
    Fixture(#[from] FixtureError),

    #[error("Harness integrity failure: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Runner state error: {0}")]
    State(#[from] StateTransitionError),
}

/// A finished run.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: BenchmarkReport,
    /// Every scenario reached `min_samples`.
    pub complete: bool,
}

/// Orchestrates isolated measurement of every scenario in a matrix.
pub struct BenchmarkRunner<E> {
    config: BenchConfig,
    matrix: ScenarioMatrix,
    executor: E,
    state: RunStateMachine,
}

impl<E: ForkExecutor> BenchmarkRunner<E> {
    pub fn new(config: BenchConfig, matrix: ScenarioMatrix, executor: E) -> Self {
        Self {
            config,
            matrix,
            executor,
            state: RunStateMachine::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state.state()
    }

    pub fn matrix(&self) -> &ScenarioMatrix {
        &self.matrix
    }

    /// Run every scenario. A fatal error leaves the runner in `Failed`.
    pub async fn run(&mut self) -> Result<RunOutcome, RunError> {
        match self.run_inner().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(
                    state = %self.state.state(),
                    error = %e,
                    "Benchmark run aborted"
                );
                self.state.fail();
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self) -> Result<RunOutcome, RunError> {
        self.state.transition_to(RunState::Setup)?;
        self.setup()?;

        let scenarios = self.matrix.scenarios().to_vec();
        let mut entries = Vec::with_capacity(scenarios.len());
        for scenario in &scenarios {
            entries.push(self.measure(scenario).await?);
        }

        self.state.transition_to(RunState::Reporting)?;
        let mut report = BenchmarkReport::new(self.config.clone());
        for entry in entries {
            report.add_entry(entry);
        }
        let complete = report.is_complete();

        self.state.transition_to(RunState::Done)?;
        tracing::info!(
            scenarios = report.entries.len(),
            complete = complete,
            elapsed_ms = self.state.elapsed().as_millis() as u64,
            "Benchmark run finished"
        );

        Ok(RunOutcome { report, complete })
    }

    /// Build the fixture once and check that every scenario observes its
    /// declared outcome before any timing is taken.
    fn setup(&self) -> Result<(), RunError> {
        let fixture = Fixture::build(&self.config)?;
        for scenario in self.matrix.iter() {
            let probe = fixture.probe(scenario)?;
            probe.verify(scenario, "setup preflight")?;
            // Stable across repeated invocations.
            probe.verify(scenario, "setup preflight")?;
        }

        tracing::info!(
            scenarios = self.matrix.len(),
            forks = self.config.forks,
            isolation = %self.config.isolation,
            "Setup complete"
        );
        Ok(())
    }

    async fn measure(&mut self, scenario: &Scenario) -> Result<ReportEntry, RunError> {
        let mut aggregate = SampleAggregate::new();
        let mut forks_completed = 0;
        let mut forks_failed = 0;

        for fork in 0..self.config.forks {
            self.state.transition_to(RunState::ForkStarting)?;
            match self.run_fork(scenario, fork).await? {
                Some(outcome) => {
                    // Recorded once the fork has returned; the fork's own
                    // warmup and measurement are not observable from here.
                    self.state.transition_to(RunState::Warmup)?;
                    self.state.transition_to(RunState::Measuring)?;
                    aggregate.merge(&outcome.aggregate);
                    forks_completed += 1;
                }
                None => forks_failed += 1,
            }
        }

        self.state.transition_to(RunState::Aggregating)?;
        let entry = ReportEntry::from_aggregate(
            scenario,
            &aggregate,
            forks_completed,
            forks_failed,
            &self.config,
        );

        if entry.is_measured() {
            tracing::info!(
                scenario = %scenario.name,
                average = entry.average_time.unwrap_or_default(),
                unit = %entry.unit,
                samples = entry.sample_count,
                forks_failed = forks_failed,
                "Scenario measured"
            );
        } else {
            tracing::warn!(
                scenario = %scenario.name,
                samples = entry.sample_count,
                min_samples = self.config.min_samples,
                forks_failed = forks_failed,
                "Scenario has insufficient samples"
            );
        }

        Ok(entry)
    }

    /// Run one fork, retrying lost replicates. `None` means the replicate is lost.
    async fn run_fork(
        &mut self,
        scenario: &Scenario,
        fork: u32,
    ) -> Result<Option<ForkOutcome>, RunError> {
        let attempts = self.config.fork_retries + 1;
        for attempt in 1..=attempts {
            if attempt > 1 {
                self.state.transition_to(RunState::ForkStarting)?;
            }

            let failure = match self.executor.run_fork(scenario, fork).await {
                Ok(outcome) => match self.check_outcome(scenario, fork, outcome) {
                    Ok(outcome) => return Ok(Some(outcome)),
                    Err(failure) => failure,
                },
                Err(ForkError::Integrity(e)) => return Err(e.into()),
                Err(ForkError::Failure(failure)) => failure,
            };

            tracing::warn!(
                scenario = %scenario.name,
                fork = fork,
                attempt = attempt,
                attempts = attempts,
                error = %failure,
                "Fork lost"
            );
        }
        Ok(None)
    }

    /// Reject outcomes that do not belong to this fork or are short of samples.
    fn check_outcome(
        &self,
        scenario: &Scenario,
        fork: u32,
        outcome: ForkOutcome,
    ) -> Result<ForkOutcome, ForkFailure> {
        let expected = u64::from(self.config.measurement_iterations);
        let reason = if outcome.scenario != scenario.name || outcome.fork != fork {
            format!(
                "outcome is for fork {} of '{}'",
                outcome.fork, outcome.scenario
            )
        } else if outcome.aggregate.iterations != expected {
            format!(
                "reported {} measured iterations, expected {}",
                outcome.aggregate.iterations, expected
            )
        } else {
            return Ok(outcome);
        };

        Err(ForkFailure::Protocol {
            scenario: scenario.name.clone(),
            fork,
            reason,
        })
    }
}
