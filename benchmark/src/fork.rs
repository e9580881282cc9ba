// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fork isolation.
//!
//! Every replicate of a scenario runs in a fork: a fresh fixture, its own
//! warmup, its own measured iterations. A fork is also a failure boundary:
//! a crash or timeout loses that replicate only.
//!
//! [`ProcessForkExecutor`] re-executes the benchmark binary as a worker
//! process per fork. [`InProcessExecutor`] builds a fresh fixture on a
//! blocking thread instead, which is weaker isolation but needs no binary.

use std::future::Future;
use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use resolvebench_core::{BenchConfig, BenchError, HardValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fixture::{Fixture, FixtureError, IntegrityError};
use crate::harness::{measure, BenchmarkHarness};
use crate::metrics::SampleAggregate;
use crate::scenario::{Scenario, ScenarioMatrix};

/// Environment variable carrying the effective YAML config to a worker.
pub const WORKER_CONFIG_ENV: &str = "RESOLVEBENCH_WORKER_CONFIG";

/// Worker exit code for an integrity failure.
pub const EXIT_INTEGRITY: i32 = 3;

/// Worker exit code for any other failure.
pub const EXIT_WORKER_FAILURE: i32 = 1;

/// Lines of worker stderr kept in a crash report.
const STDERR_TAIL_LINES: usize = 5;

/// Measurement produced by one completed fork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkOutcome {
    pub scenario: String,
    pub fork: u32,
    pub pid: u32,
    pub aggregate: SampleAggregate,
    pub setup_ns: u64,
    pub warmup_ns: u64,
    pub measurement_ns: u64,
}

/// The single line a worker prints on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Completed(ForkOutcome),
    IntegrityFailure { scenario: String, message: String },
}

/// A lost replicate. Recoverable: the run continues without it.
#[derive(Debug, Error)]
pub enum ForkFailure {
    #[error("Fork {fork} of '{scenario}' crashed: {reason}")]
    Crashed {
        scenario: String,
        fork: u32,
        reason: String,
    },

    #[error("Fork {fork} of '{scenario}' timed out after {timeout_ms}ms")]
    TimedOut {
        scenario: String,
        fork: u32,
        timeout_ms: u64,
    },

    #[error("Fork {fork} of '{scenario}' broke the worker protocol: {reason}")]
    Protocol {
        scenario: String,
        fork: u32,
        reason: String,
    },
}

/// Everything a fork can end with besides a measurement.
#[derive(Debug, Error)]
pub enum ForkError {
    #[error(transparent)]
    Failure(#[from] ForkFailure),

    /// Fatal for the whole run.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

/// Failures inside a worker, before they are classified by the supervisor.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{0}")]
    Fixture(#[from] FixtureError),

    #[error("{0}")]
    Integrity(#[from] IntegrityError),

    #[error("{0}")]
    Validation(#[from] HardValidationError),

    #[error("Unknown scenario: {name}")]
    UnknownScenario { name: String },
}

/// Runs one fork of one scenario.
pub trait ForkExecutor {
    fn run_fork(
        &self,
        scenario: &Scenario,
        fork: u32,
    ) -> impl Future<Output = Result<ForkOutcome, ForkError>> + Send;
}

/// Build a fresh fixture, check integrity, then warm up and measure.
///
/// This is the body of every fork regardless of isolation.
pub fn measure_scenario(
    config: &BenchConfig,
    scenario: &Scenario,
    fork: u32,
) -> Result<ForkOutcome, WorkerError> {
    let (fixture, setup) = measure(|| Fixture::build(config));
    let fixture = fixture?;
    let probe = fixture.probe(scenario)?;

    probe.verify(scenario, "fork setup")?;

    let run = BenchmarkHarness::new()
        .warmup(u64::from(config.warmup_iterations))
        .iterations(u64::from(config.measurement_iterations))
        .batch_size(config.batch_size)
        .run(|| probe.invoke());

    // Resolution must not have drifted while being hammered.
    probe.verify(scenario, "fork measurement")?;

    tracing::debug!(
        scenario = %scenario.name,
        fork = fork,
        setup_ms = setup.as_millis() as u64,
        warmup_ms = run.warmup.as_millis() as u64,
        measurement_ms = run.measurement.as_millis() as u64,
        "Fork measured"
    );

    Ok(ForkOutcome {
        scenario: scenario.name.clone(),
        fork,
        pid: std::process::id(),
        aggregate: run.aggregate,
        setup_ns: setup.as_nanos() as u64,
        warmup_ns: run.warmup.as_nanos() as u64,
        measurement_ns: run.measurement.as_nanos() as u64,
    })
}

/// Entry point of a worker process. Prints one [`WorkerMessage`] line and
/// returns the process exit code.
pub fn worker_main(config: &BenchConfig, scenario_name: &str, fork: u32) -> i32 {
    if let Some(cpu) = config.cpu_affinity {
        if let Err(e) = pin_to_cpu(cpu) {
            tracing::warn!(cpu = cpu, error = %e, "Failed to pin worker to CPU");
        }
    }

    let result = ScenarioMatrix::standard(&config.repository_sizes)
        .map_err(WorkerError::from)
        .and_then(|matrix| {
            matrix
                .get(scenario_name)
                .cloned()
                .ok_or_else(|| WorkerError::UnknownScenario {
                    name: scenario_name.to_string(),
                })
        })
        .and_then(|scenario| measure_scenario(config, &scenario, fork));

    let (message, code) = match result {
        Ok(outcome) => (WorkerMessage::Completed(outcome), 0),
        Err(WorkerError::Integrity(e)) => (
            WorkerMessage::IntegrityFailure {
                scenario: scenario_name.to_string(),
                message: e.to_string(),
            },
            EXIT_INTEGRITY,
        ),
        Err(e) => {
            tracing::error!(
                scenario = %scenario_name,
                fork = fork,
                error = %e,
                "Worker failed"
            );
            return EXIT_WORKER_FAILURE;
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let written = serde_json::to_writer(&mut out, &message)
        .map_err(std::io::Error::from)
        .and_then(|()| writeln!(out))
        .and_then(|()| out.flush());
    match written {
        Ok(()) => code,
        Err(e) => {
            tracing::error!(
                scenario = %scenario_name,
                fork = fork,
                error = %e,
                "Worker failed to report"
            );
            EXIT_WORKER_FAILURE
        }
    }
}

#[cfg(target_os = "linux")]
fn pin_to_cpu(cpu: usize) -> Result<(), nix::Error> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut set = CpuSet::new();
    set.set(cpu)?;
    sched_setaffinity(Pid::from_raw(0), &set)
}

#[cfg(not(target_os = "linux"))]
fn pin_to_cpu(_cpu: usize) -> Result<(), nix::Error> {
    Err(nix::Error::ENOTSUP)
}

/// Runs each fork as a separate worker process.
#[derive(Debug, Clone)]
pub struct ProcessForkExecutor {
    program: PathBuf,
    config_yaml: String,
    timeout: Duration,
}

impl ProcessForkExecutor {
    /// Re-execute `program` (which must accept the `worker` subcommand).
    pub fn new(program: impl Into<PathBuf>, config: &BenchConfig) -> Result<Self, BenchError> {
        Ok(Self {
            program: program.into(),
            config_yaml: config.to_yaml()?,
            timeout: config.fork_timeout(),
        })
    }

    /// Re-execute the currently running binary.
    pub fn current_exe(config: &BenchConfig) -> Result<Self, BenchError> {
        let program = std::env::current_exe().map_err(|e| BenchError::Io {
            context: "locating current executable",
            source: e,
        })?;
        Self::new(program, config)
    }

    fn interpret(&self, scenario: &Scenario, fork: u32, output: Output) -> Result<ForkOutcome, ForkError> {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<WorkerMessage>);

        let integrity = |message: String| {
            ForkError::Integrity(IntegrityError::Reported {
                scenario: scenario.name.clone(),
                fork,
                message,
            })
        };

        match message {
            Some(Ok(WorkerMessage::IntegrityFailure { message, .. })) => Err(integrity(message)),
            _ if output.status.code() == Some(EXIT_INTEGRITY) => {
                Err(integrity(stderr_tail(&output.stderr)))
            }
            _ if !output.status.success() => {
                let reason = match output.status.signal() {
                    Some(signal) => format!("killed by {}", signal_name(signal)),
                    None => format!(
                        "exited with {}: {}",
                        output.status,
                        stderr_tail(&output.stderr)
                    ),
                };
                Err(ForkFailure::Crashed {
                    scenario: scenario.name.clone(),
                    fork,
                    reason,
                }
                .into())
            }
            Some(Ok(WorkerMessage::Completed(outcome))) => Ok(outcome),
            Some(Err(e)) => Err(ForkFailure::Protocol {
                scenario: scenario.name.clone(),
                fork,
                reason: format!("unparsable worker output: {}", e),
            }
            .into()),
            None => Err(ForkFailure::Protocol {
                scenario: scenario.name.clone(),
                fork,
                reason: "worker exited without reporting".to_string(),
            }
            .into()),
        }
    }
}

impl ForkExecutor for ProcessForkExecutor {
    async fn run_fork(&self, scenario: &Scenario, fork: u32) -> Result<ForkOutcome, ForkError> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .arg("worker")
            .arg("--scenario")
            .arg(&scenario.name)
            .arg("--fork")
            .arg(fork.to_string())
            .env(WORKER_CONFIG_ENV, &self.config_yaml)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| ForkFailure::Crashed {
            scenario: scenario.name.clone(),
            fork,
            reason: format!("failed to spawn {}: {}", self.program.display(), e),
        })?;

        tracing::debug!(
            scenario = %scenario.name,
            fork = fork,
            pid = child.id(),
            "Spawned fork worker"
        );

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ForkFailure::Crashed {
                    scenario: scenario.name.clone(),
                    fork,
                    reason: format!("failed to collect worker output: {}", e),
                }
                .into())
            }
            Err(_) => {
                return Err(ForkFailure::TimedOut {
                    scenario: scenario.name.clone(),
                    fork,
                    timeout_ms: self.timeout.as_millis() as u64,
                }
                .into())
            }
        };

        self.interpret(scenario, fork, output)
    }
}

/// Runs each fork on a blocking thread against a freshly built fixture.
///
/// A fork that times out is abandoned; its thread runs to completion in the
/// background and its result is discarded.
#[derive(Debug, Clone)]
pub struct InProcessExecutor {
    config: Arc<BenchConfig>,
}

impl InProcessExecutor {
    pub fn new(config: BenchConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl ForkExecutor for InProcessExecutor {
    async fn run_fork(&self, scenario: &Scenario, fork: u32) -> Result<ForkOutcome, ForkError> {
        let config = Arc::clone(&self.config);
        let owned = scenario.clone();
        let task = tokio::task::spawn_blocking(move || measure_scenario(&config, &owned, fork));

        match tokio::time::timeout(self.config.fork_timeout(), task).await {
            Ok(Ok(Ok(outcome))) => Ok(outcome),
            Ok(Ok(Err(WorkerError::Integrity(e)))) => Err(e.into()),
            Ok(Ok(Err(e))) => Err(ForkFailure::Crashed {
                scenario: scenario.name.clone(),
                fork,
                reason: e.to_string(),
            }
            .into()),
            Ok(Err(join_error)) => Err(ForkFailure::Crashed {
                scenario: scenario.name.clone(),
                fork,
                reason: if join_error.is_panic() {
                    "fork panicked".to_string()
                } else {
                    join_error.to_string()
                },
            }
            .into()),
            Err(_) => Err(ForkFailure::TimedOut {
                scenario: scenario.name.clone(),
                fork,
                timeout_ms: self.config.fork_timeout_ms,
            }
            .into()),
        }
    }
}

fn signal_name(signal: i32) -> String {
    nix::sys::signal::Signal::try_from(signal)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("signal {}", signal))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join(" | ");
    if tail.is_empty() {
        "no stderr output".to_string()
    } else {
        tail
    }
}
