// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Validates benchmark configuration before any fixture is built.
//! Any invalid field results in a HardValidationError that prevents the run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult, HardValidationError};

const MAX_FORKS: u32 = 100;
const MAX_ITERATIONS: u32 = 10_000;
const MAX_BATCH_SIZE: u64 = 10_000_000;
const MAX_REPOSITORY_SIZE: usize = 10_000;
const MAX_FORK_RETRIES: u32 = 10;

/// Output time unit for reported averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "ns")]
    Nanoseconds,
    #[serde(rename = "us")]
    Microseconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
}

impl TimeUnit {
    /// Nanoseconds in one unit.
    pub const fn nanos_per_unit(&self) -> f64 {
        match self {
            Self::Nanoseconds => 1.0,
            Self::Microseconds => 1_000.0,
            Self::Milliseconds => 1_000_000.0,
            Self::Seconds => 1_000_000_000.0,
        }
    }

    /// Convert a nanosecond value into this unit.
    pub fn from_nanos(&self, nanos: f64) -> f64 {
        nanos / self.nanos_per_unit()
    }

    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "us",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for TimeUnit {
    type Err = HardValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" | "nanoseconds" => Ok(Self::Nanoseconds),
            "us" | "μs" | "microseconds" => Ok(Self::Microseconds),
            "ms" | "milliseconds" => Ok(Self::Milliseconds),
            "s" | "seconds" => Ok(Self::Seconds),
            other => Err(HardValidationError::InvalidFieldValue {
                field: "time_unit",
                value: other.to_string(),
                reason: "Expected one of ns, us, ms, s".to_string(),
            }),
        }
    }
}

/// What the reported score means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Average time per invocation.
    AverageTime,
    /// Invocations per time unit.
    Throughput,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AverageTime => write!(f, "average_time"),
            Self::Throughput => write!(f, "throughput"),
        }
    }
}

impl FromStr for Mode {
    type Err = HardValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "average_time" | "avgt" => Ok(Self::AverageTime),
            "throughput" | "thrpt" => Ok(Self::Throughput),
            other => Err(HardValidationError::InvalidFieldValue {
                field: "mode",
                value: other.to_string(),
                reason: "Expected average_time or throughput".to_string(),
            }),
        }
    }
}

/// How forks are isolated from each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// Each fork is a separate OS process.
    Process,
    /// Each fork builds a fresh fixture on its own thread.
    InProcess,
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process => write!(f, "process"),
            Self::InProcess => write!(f, "in_process"),
        }
    }
}

impl FromStr for Isolation {
    type Err = HardValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "process" => Ok(Self::Process),
            "in_process" | "in-process" => Ok(Self::InProcess),
            other => Err(HardValidationError::InvalidFieldValue {
                field: "isolation",
                value: other.to_string(),
                reason: "Expected process or in_process".to_string(),
            }),
        }
    }
}

/// Raw configuration as parsed from YAML (before validation).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBenchConfig {
    #[serde(default = "default_forks")]
    pub forks: u32,
    #[serde(default = "default_iterations")]
    pub warmup_iterations: u32,
    #[serde(default = "default_iterations")]
    pub measurement_iterations: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_repository_sizes")]
    pub repository_sizes: Vec<usize>,
    #[serde(default = "default_time_unit")]
    pub time_unit: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_fork_timeout_ms")]
    pub fork_timeout_ms: u64,
    #[serde(default = "default_fork_retries")]
    pub fork_retries: u32,
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
    #[serde(default = "default_isolation")]
    pub isolation: String,
    #[serde(default)]
    pub cpu_affinity: Option<usize>,
    #[serde(default)]
    pub fixture_dir: Option<String>,
}

fn default_forks() -> u32 {
    5
}

fn default_iterations() -> u32 {
    5
}

fn default_batch_size() -> u64 {
    1_000
}

fn default_repository_sizes() -> Vec<usize> {
    vec![0, 50, 100]
}

fn default_time_unit() -> String {
    "us".to_string()
}

fn default_mode() -> String {
    "average_time".to_string()
}

fn default_fork_timeout_ms() -> u64 {
    60_000
}

fn default_fork_retries() -> u32 {
    1
}

fn default_min_samples() -> u64 {
    1
}

fn default_isolation() -> String {
    "process".to_string()
}

impl Default for RawBenchConfig {
    fn default() -> Self {
        Self {
            forks: default_forks(),
            warmup_iterations: default_iterations(),
            measurement_iterations: default_iterations(),
            batch_size: default_batch_size(),
            repository_sizes: default_repository_sizes(),
            time_unit: default_time_unit(),
            mode: default_mode(),
            fork_timeout_ms: default_fork_timeout_ms(),
            fork_retries: default_fork_retries(),
            min_samples: default_min_samples(),
            isolation: default_isolation(),
            cpu_affinity: None,
            fixture_dir: None,
        }
    }
}

/// Validated benchmark configuration.
///
/// Deserializing goes through the same validation as [`ConfigLoader`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBenchConfig")]
pub struct BenchConfig {
    /// Independent isolated replicates per scenario.
    pub forks: u32,
    /// Discarded iterations per fork.
    pub warmup_iterations: u32,
    /// Counted iterations per fork.
    pub measurement_iterations: u32,
    /// Invocations timed together as one iteration.
    pub batch_size: u64,
    /// Local entry counts of the isolated topologies, sorted and unique.
    pub repository_sizes: Vec<usize>,
    pub time_unit: TimeUnit,
    pub mode: Mode,
    /// Wall-clock ceiling per fork.
    pub fork_timeout_ms: u64,
    /// Extra attempts for a fork that crashed or timed out.
    pub fork_retries: u32,
    /// Minimum measured iterations for a scenario to count as complete.
    pub min_samples: u64,
    pub isolation: Isolation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_affinity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_dir: Option<PathBuf>,
}

impl BenchConfig {
    pub fn fork_timeout(&self) -> Duration {
        Duration::from_millis(self.fork_timeout_ms)
    }

    /// Largest configured repository size.
    pub fn max_repository_size(&self) -> usize {
        self.repository_sizes.iter().copied().max().unwrap_or(0)
    }

    /// Serialize the effective configuration, e.g. to hand it to a fork worker.
    pub fn to_yaml(&self) -> BenchResult<String> {
        serde_yaml::to_string(self).map_err(|e| BenchError::ConfigParse {
            message: format!("YAML serialize error: {}", e),
        })
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            forks: default_forks(),
            warmup_iterations: default_iterations(),
            measurement_iterations: default_iterations(),
            batch_size: default_batch_size(),
            repository_sizes: default_repository_sizes(),
            time_unit: TimeUnit::Microseconds,
            mode: Mode::AverageTime,
            fork_timeout_ms: default_fork_timeout_ms(),
            fork_retries: default_fork_retries(),
            min_samples: default_min_samples(),
            isolation: Isolation::Process,
            cpu_affinity: None,
            fixture_dir: None,
        }
    }
}

impl TryFrom<RawBenchConfig> for BenchConfig {
    type Error = HardValidationError;

    fn try_from(raw: RawBenchConfig) -> Result<Self, Self::Error> {
        ConfigLoader::validate(raw)
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<BenchConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load raw configuration from a YAML string without validating it,
    /// so command-line overrides can be applied first.
    pub fn load_raw(content: &str) -> BenchResult<RawBenchConfig> {
        if content.trim().is_empty() {
            return Ok(RawBenchConfig::default());
        }
        serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
            message: format!("YAML parse error: {}", e),
        })
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<BenchConfig> {
        let raw = Self::load_raw(content)?;
        Ok(Self::validate(raw)?)
    }

    /// Validate raw configuration and convert to validated types.
    pub fn validate(raw: RawBenchConfig) -> Result<BenchConfig, HardValidationError> {
        if raw.forks == 0 || raw.forks > MAX_FORKS {
            return Err(HardValidationError::InvalidFieldValue {
                field: "forks",
                value: raw.forks.to_string(),
                reason: format!("Must be between 1 and {}", MAX_FORKS),
            });
        }

        if raw.warmup_iterations > MAX_ITERATIONS {
            return Err(HardValidationError::InvalidFieldValue {
                field: "warmup_iterations",
                value: raw.warmup_iterations.to_string(),
                reason: format!("Must not exceed {}", MAX_ITERATIONS),
            });
        }

        if raw.measurement_iterations == 0 || raw.measurement_iterations > MAX_ITERATIONS {
            return Err(HardValidationError::InvalidFieldValue {
                field: "measurement_iterations",
                value: raw.measurement_iterations.to_string(),
                reason: format!("Must be between 1 and {}", MAX_ITERATIONS),
            });
        }

        if raw.batch_size == 0 || raw.batch_size > MAX_BATCH_SIZE {
            return Err(HardValidationError::InvalidFieldValue {
                field: "batch_size",
                value: raw.batch_size.to_string(),
                reason: format!("Must be between 1 and {}", MAX_BATCH_SIZE),
            });
        }

        if raw.repository_sizes.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "repository_sizes",
                context: "benchmark config".to_string(),
            });
        }

        if let Some(&size) = raw
            .repository_sizes
            .iter()
            .find(|&&size| size > MAX_REPOSITORY_SIZE)
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "repository_sizes",
                value: size.to_string(),
                reason: format!("Each size must not exceed {}", MAX_REPOSITORY_SIZE),
            });
        }

        let mut repository_sizes = raw.repository_sizes;
        repository_sizes.sort_unstable();
        repository_sizes.dedup();

        let time_unit = raw.time_unit.parse::<TimeUnit>()?;
        let mode = raw.mode.parse::<Mode>()?;
        let isolation = raw.isolation.parse::<Isolation>()?;

        if raw.fork_timeout_ms == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "fork_timeout_ms",
                value: "0".to_string(),
                reason: "Fork timeout must be greater than 0".to_string(),
            });
        }

        if raw.fork_retries > MAX_FORK_RETRIES {
            return Err(HardValidationError::InvalidFieldValue {
                field: "fork_retries",
                value: raw.fork_retries.to_string(),
                reason: format!("Must not exceed {}", MAX_FORK_RETRIES),
            });
        }

        if raw.min_samples == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "min_samples",
                value: "0".to_string(),
                reason: "At least one sample is required".to_string(),
            });
        }

        let reachable = u64::from(raw.forks) * u64::from(raw.measurement_iterations);
        if raw.min_samples > reachable {
            return Err(HardValidationError::InvalidFieldValue {
                field: "min_samples",
                value: raw.min_samples.to_string(),
                reason: format!(
                    "Exceeds the {} samples that forks * measurement_iterations can produce",
                    reachable
                ),
            });
        }

        let fixture_dir = match raw.fixture_dir {
            Some(dir) if dir.trim().is_empty() => {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "fixture_dir",
                    value: dir,
                    reason: "Fixture directory cannot be empty".to_string(),
                });
            }
            Some(dir) => Some(PathBuf::from(dir)),
            None => None,
        };

        Ok(BenchConfig {
            forks: raw.forks,
            warmup_iterations: raw.warmup_iterations,
            measurement_iterations: raw.measurement_iterations,
            batch_size: raw.batch_size,
            repository_sizes,
            time_unit,
            mode,
            fork_timeout_ms: raw.fork_timeout_ms,
            fork_retries: raw.fork_retries,
            min_samples: raw.min_samples,
            isolation,
            cpu_affinity: raw.cpu_affinity,
            fixture_dir,
        })
    }
}
