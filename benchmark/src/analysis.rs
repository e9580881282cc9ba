// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Sanity checks over finished reports.
//!
//! - [`compare`]: two runs with the same configuration agree within a tolerance.
//! - [`check_floor`]: the baseline is cheaper than every resolver scenario.
//! - [`check_scan_monotonic`]: misses do not get cheaper as entries are added.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metrics::{BenchmarkReport, ReportEntry};
use crate::scenario::Expectation;

/// Default relative tolerance between two runs.
pub const DEFAULT_TOLERANCE: f64 = 0.20;

/// One scenario present in both reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub scenario_name: String,
    pub baseline: f64,
    pub candidate: f64,
    /// `(candidate - baseline) / baseline`
    pub relative_change: f64,
    pub within_tolerance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub tolerance: f64,
    pub rows: Vec<ComparisonRow>,
    /// Scenarios that could not be compared (missing or unmeasured on either side).
    pub skipped: Vec<String>,
}

impl Comparison {
    pub fn within_tolerance(&self) -> bool {
        self.rows.iter().all(|r| r.within_tolerance)
    }

    pub fn regressions(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(|r| !r.within_tolerance)
    }
}

fn measured_average(entry: &ReportEntry) -> Option<f64> {
    entry
        .is_measured()
        .then_some(entry.average_time)
        .flatten()
        .map(|avg| avg * entry.unit.nanos_per_unit())
}

/// Compare two reports scenario by scenario, in nanoseconds per invocation.
pub fn compare(baseline: &BenchmarkReport, candidate: &BenchmarkReport, tolerance: f64) -> Comparison {
    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for entry in &baseline.entries {
        let pair = measured_average(entry).zip(
            candidate
                .entry(&entry.scenario_name)
                .and_then(measured_average),
        );

        match pair {
            Some((before, after)) if before > 0.0 => {
                let relative_change = (after - before) / before;
                rows.push(ComparisonRow {
                    scenario_name: entry.scenario_name.clone(),
                    baseline: before,
                    candidate: after,
                    relative_change,
                    within_tolerance: relative_change.abs() < tolerance,
                });
            }
            _ => skipped.push(entry.scenario_name.clone()),
        }
    }

    for entry in &candidate.entries {
        if baseline.entry(&entry.scenario_name).is_none() {
            skipped.push(entry.scenario_name.clone());
        }
    }

    Comparison {
        tolerance,
        rows,
        skipped,
    }
}

/// A property that a report failed to satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub scenario_name: String,
    pub reason: String,
}

/// The baseline average must be strictly below every resolver scenario.
pub fn check_floor(report: &BenchmarkReport) -> Vec<Violation> {
    let Some(floor) = report
        .entries
        .iter()
        .find(|e| e.target == "baseline")
        .and_then(measured_average)
    else {
        return Vec::new();
    };

    report
        .entries
        .iter()
        .filter(|e| e.target != "baseline")
        .filter_map(|e| measured_average(e).map(|avg| (e, avg)))
        .filter(|&(_, avg)| avg <= floor)
        .map(|(e, avg)| Violation {
            scenario_name: e.scenario_name.clone(),
            reason: format!("{:.1}ns is not above the baseline floor of {:.1}ns", avg, floor),
        })
        .collect()
}

/// Miss latency of isolated topologies must not drop as entry count grows,
/// allowing `tolerance` relative noise.
pub fn check_scan_monotonic(report: &BenchmarkReport, tolerance: f64) -> Vec<Violation> {
    let misses: BTreeMap<usize, (&ReportEntry, f64)> = report
        .entries
        .iter()
        .filter(|e| e.expected == Expectation::Miss)
        .filter_map(|e| {
            let size = e.target.strip_prefix("isolated_")?.parse::<usize>().ok()?;
            Some((size, (e, measured_average(e)?)))
        })
        .collect();

    misses
        .values()
        .zip(misses.values().skip(1))
        .filter(|((_, smaller), (_, larger))| *larger < *smaller * (1.0 - tolerance))
        .map(|((prev, smaller), (entry, larger))| Violation {
            scenario_name: entry.scenario_name.clone(),
            reason: format!(
                "{:.1}ns is below {:.1}ns of {} despite more entries",
                larger, smaller, prev.scenario_name
            ),
        })
        .collect()
}
