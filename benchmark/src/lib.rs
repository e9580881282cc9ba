// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! resolvebench Benchmarking Framework
//!
//! Measures how long it takes to resolve a name through a layered,
//! delegating resolver, depending on whether the name exists and on how many
//! local repository entries must be scanned before giving up.
//!
//! # Protocol
//!
//! - **Setup**: build the resolver fixture and check every scenario's
//!   expected hit/miss outcome. Any failure aborts the run.
//! - **Forks**: each scenario is replicated across isolated forks, each with
//!   its own fixture, warmup iterations and measured iterations.
//! - **Aggregation**: fork samples are merged into one average per scenario.
//! - **Reporting**: one entry per scenario, in matrix order, as JSON.

pub mod analysis;
pub mod fixture;
pub mod fork;
pub mod harness;
pub mod metrics;
pub mod reporter;
pub mod runner;
pub mod scenario;

pub use analysis::{check_floor, check_scan_monotonic, compare, Comparison};
pub use fixture::{Fixture, FixtureError, IntegrityError, Probe};
pub use fork::{ForkExecutor, ForkFailure, InProcessExecutor, ProcessForkExecutor};
pub use harness::BenchmarkHarness;
pub use metrics::{BenchmarkReport, EntryStatus, ReportEntry, SampleAggregate, SystemInfo};
pub use reporter::{render_table, JsonReporter};
pub use runner::{BenchmarkRunner, RunError, RunOutcome};
pub use scenario::{Expectation, Scenario, ScenarioMatrix, ScenarioTarget, TopologyId};
