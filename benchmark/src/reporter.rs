// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Report output.
//!
//! Saves benchmark reports to timestamped JSON files for machine parsing and
//! renders a plain text summary table.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::metrics::{format_latency, BenchmarkReport, EntryStatus};

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Report IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// JSON reporter for benchmark results.
pub struct JsonReporter {
    /// Output directory for benchmark data
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create a new JSON reporter with the specified output directory.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ReporterError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save a benchmark report to a JSON file.
    ///
    /// Returns the path to the created file.
    pub fn save(&self, report: &BenchmarkReport) -> Result<PathBuf, ReporterError> {
        let timestamp = report.timestamp.format("%Y-%m-%dT%H-%M-%SZ");
        let run = report.run_id.simple().to_string();
        let filename = format!("resolution_{}_{}.json", timestamp, &run[..8]);
        let filepath = self.output_dir.join(&filename);

        let file = File::create(&filepath)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, report)?;

        tracing::info!(path = %filepath.display(), "Benchmark report saved");
        Ok(filepath)
    }

    /// List all existing benchmark files in the output directory.
    pub fn list_reports(&self) -> Result<Vec<PathBuf>, ReporterError> {
        let mut reports = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                reports.push(path);
            }
        }
        reports.sort();
        Ok(reports)
    }

    /// Load an existing benchmark report from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<BenchmarkReport, ReporterError> {
        let file = File::open(path)?;
        let report = serde_json::from_reader(file)?;
        Ok(report)
    }
}

/// Render the report as an aligned text table, one row per scenario.
pub fn render_table(report: &BenchmarkReport) -> String {
    let name_width = report
        .entries
        .iter()
        .map(|e| e.scenario_name.len())
        .max()
        .unwrap_or(0)
        .max("Scenario".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<name_width$}  {:>12}  {:>10}  {:>10}  {:>8}  {:>5}",
        "Scenario", "Score", "Error", "Mean", "Samples", "Lost",
    );

    for entry in &report.entries {
        let unit = entry.unit.nanos_per_unit();
        let (score, error, mean) = match (entry.status, entry.average_time) {
            (EntryStatus::Measured, Some(avg)) => (
                format!("{:.3} {}/op", avg, entry.unit),
                entry
                    .error
                    .map(|e| format!("± {:.3}", e))
                    .unwrap_or_else(|| "-".to_string()),
                format_latency(avg * unit),
            ),
            _ => (
                "insufficient".to_string(),
                "-".to_string(),
                "-".to_string(),
            ),
        };
        let _ = writeln!(
            out,
            "{:<name_width$}  {:>12}  {:>10}  {:>10}  {:>8}  {:>5}",
            entry.scenario_name, score, error, mean, entry.sample_count, entry.forks_failed,
        );

        if let Some(throughput) = entry.throughput {
            let _ = writeln!(
                out,
                "{:<name_width$}  {:>12}",
                "",
                format!("{:.3} ops/{}", throughput, entry.unit),
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ReportEntry, SampleAggregate};
    use crate::scenario::Scenario;
    use resolvebench_core::BenchConfig;
    use tempfile::TempDir;

    fn sample_report() -> BenchmarkReport {
        let config = BenchConfig::default();
        let mut agg = SampleAggregate::new();
        agg.record(2_000, 10);
        agg.record(4_000, 10);

        let mut report = BenchmarkReport::new(config.clone());
        report.add_entry(ReportEntry::from_aggregate(
            &Scenario::baseline().unwrap(),
            &agg,
            1,
            0,
            &config,
        ));
        report.add_entry(ReportEntry::from_aggregate(
            &Scenario::unknown(crate::scenario::TopologyId::Context).unwrap(),
            &SampleAggregate::new(),
            0,
            5,
            &config,
        ));
        report
    }

    #[test]
    fn test_reporter_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path()).unwrap();

        let report = sample_report();
        let path = reporter.save(&report).unwrap();
        assert!(path.exists());

        let loaded = JsonReporter::load(&path).unwrap();
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.entries[0].scenario_name, "baseline");
        assert_eq!(loaded.entries[1].status, EntryStatus::Insufficient);
        assert_eq!(loaded.config, report.config);
    }

    #[test]
    fn test_list_reports() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path()).unwrap();

        reporter.save(&sample_report()).unwrap();
        reporter.save(&sample_report()).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        // Distinct run ids keep file names apart.
        let reports = reporter.list_reports().unwrap();
        assert_eq!(reports.len(), 2);
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&sample_report());
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Scenario"));
        assert!(lines[1].starts_with("baseline"));
        assert!(lines[1].contains("0.300 us/op"));
        assert!(lines[2].contains("insufficient"));
    }
}
