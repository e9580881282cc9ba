// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Standardized metrics types for benchmark results.
//!
//! Timing samples are folded into a [`SampleAggregate`] as soon as they are
//! taken; only the aggregate crosses fork boundaries. Report entries are
//! derived from the merged aggregate of every completed fork.

use chrono::{DateTime, Utc};
use resolvebench_core::{BenchConfig, Mode, TimeUnit};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use uuid::Uuid;

use crate::scenario::{Expectation, Scenario};

/// z-score of a two-sided 99.9% confidence interval.
const Z_999: f64 = 3.29;

/// Running aggregate of timing samples.
///
/// One sample is one measured iteration: a batch of invocations timed as a
/// whole. Sample means are per invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleAggregate {
    /// Measured iterations.
    pub iterations: u64,
    /// Invocations across all measured iterations.
    pub invocations: u64,
    /// Total measured time in nanoseconds.
    pub total_ns: u64,
    /// Sum of per-invocation iteration means.
    pub sum_mean_ns: f64,
    /// Sum of squared per-invocation iteration means.
    pub sum_sq_mean_ns: f64,
    pub min_mean_ns: Option<f64>,
    pub max_mean_ns: Option<f64>,
}

impl SampleAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one iteration of `batch` invocations that took `elapsed_ns`.
    pub fn record(&mut self, elapsed_ns: u64, batch: u64) {
        if batch == 0 {
            return;
        }
        let mean = elapsed_ns as f64 / batch as f64;

        self.iterations += 1;
        self.invocations += batch;
        self.total_ns = self.total_ns.saturating_add(elapsed_ns);
        self.sum_mean_ns += mean;
        self.sum_sq_mean_ns += mean * mean;
        self.min_mean_ns = Some(self.min_mean_ns.map_or(mean, |m| m.min(mean)));
        self.max_mean_ns = Some(self.max_mean_ns.map_or(mean, |m| m.max(mean)));
    }

    /// Combine with the aggregate of another fork.
    pub fn merge(&mut self, other: &SampleAggregate) {
        self.iterations += other.iterations;
        self.invocations += other.invocations;
        self.total_ns = self.total_ns.saturating_add(other.total_ns);
        self.sum_mean_ns += other.sum_mean_ns;
        self.sum_sq_mean_ns += other.sum_sq_mean_ns;
        self.min_mean_ns = match (self.min_mean_ns, other.min_mean_ns) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_mean_ns = match (self.max_mean_ns, other.max_mean_ns) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    pub fn is_empty(&self) -> bool {
        self.iterations == 0
    }

    /// Arithmetic mean time per invocation in nanoseconds.
    pub fn mean_ns(&self) -> Option<f64> {
        (self.invocations > 0).then(|| self.total_ns as f64 / self.invocations as f64)
    }

    /// Sample standard deviation of the per-iteration means.
    pub fn std_dev_ns(&self) -> Option<f64> {
        if self.iterations < 2 {
            return None;
        }
        let n = self.iterations as f64;
        let mean = self.sum_mean_ns / n;
        let variance = (self.sum_sq_mean_ns - n * mean * mean) / (n - 1.0);
        Some(variance.max(0.0).sqrt())
    }

    /// Half-width of the 99.9% confidence interval of the mean.
    pub fn error_ns(&self) -> Option<f64> {
        self.std_dev_ns()
            .map(|sd| Z_999 * sd / (self.iterations as f64).sqrt())
    }
}

/// Format a nanosecond value in human-readable form (auto-selects ns/μs/ms/s).
pub fn format_latency(ns: f64) -> String {
    if ns < 1_000.0 {
        format!("{:.1}ns", ns)
    } else if ns < 1_000_000.0 {
        format!("{:.2}μs", ns / 1_000.0)
    } else if ns < 1_000_000_000.0 {
        format!("{:.2}ms", ns / 1_000_000.0)
    } else {
        format!("{:.2}s", ns / 1_000_000_000.0)
    }
}

/// System information captured at benchmark time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub os_version: String,
    pub kernel_version: Option<String>,
    pub cpu_model: String,
    pub cpu_cores: usize,
    /// Total system memory in bytes
    pub memory_bytes: u64,
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// Whether a report entry carries a usable measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// At least `min_samples` measured iterations.
    Measured,
    /// Too few samples; averages are absent or not trustworthy.
    Insufficient,
}

/// Aggregated result for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub scenario_name: String,
    /// `baseline`, `context` or `isolated_<n>`.
    pub target: String,
    pub expected: Expectation,
    /// Mean time per invocation in `unit`. `None` when nothing was measured.
    pub average_time: Option<f64>,
    /// 99.9% confidence half-width of `average_time`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Invocations per `unit`, reported in throughput mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<f64>,
    pub unit: TimeUnit,
    /// Measured iterations across all completed forks.
    pub sample_count: u64,
    pub invocations: u64,
    pub forks_completed: u32,
    pub forks_failed: u32,
    pub status: EntryStatus,
}

impl ReportEntry {
    /// Build the entry for `scenario` from the merged aggregate of its forks.
    pub fn from_aggregate(
        scenario: &Scenario,
        aggregate: &SampleAggregate,
        forks_completed: u32,
        forks_failed: u32,
        config: &BenchConfig,
    ) -> Self {
        let unit = config.time_unit;
        let mean_ns = aggregate.mean_ns();
        let status = if aggregate.iterations >= config.min_samples && mean_ns.is_some() {
            EntryStatus::Measured
        } else {
            EntryStatus::Insufficient
        };

        let throughput = match config.mode {
            Mode::Throughput => mean_ns
                .filter(|&ns| ns > 0.0)
                .map(|ns| unit.nanos_per_unit() / ns),
            Mode::AverageTime => None,
        };

        Self {
            scenario_name: scenario.name.clone(),
            target: scenario.target.to_string(),
            expected: scenario.expected,
            average_time: mean_ns.map(|ns| unit.from_nanos(ns)),
            error: aggregate.error_ns().map(|ns| unit.from_nanos(ns)),
            min: aggregate.min_mean_ns.map(|ns| unit.from_nanos(ns)),
            max: aggregate.max_mean_ns.map(|ns| unit.from_nanos(ns)),
            throughput,
            unit,
            sample_count: aggregate.iterations,
            invocations: aggregate.invocations,
            forks_completed,
            forks_failed,
            status,
        }
    }

    pub fn is_measured(&self) -> bool {
        self.status == EntryStatus::Measured
    }
}

/// Complete benchmark run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub run_id: Uuid,
    pub benchmark_suite: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub system_info: SystemInfo,
    /// Effective configuration of the run.
    pub config: BenchConfig,
    /// One entry per scenario, in matrix order.
    pub entries: Vec<ReportEntry>,
}

impl BenchmarkReport {
    pub fn new(config: BenchConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            benchmark_suite: "resolvebench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
            config,
            entries: Vec::new(),
        }
    }

    pub fn add_entry(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn entry(&self, scenario_name: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.scenario_name == scenario_name)
    }

    /// Whether every entry reached the minimum sample count.
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(ReportEntry::is_measured)
    }
}
