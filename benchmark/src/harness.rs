// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark harness for running and timing operations within one fork.
//!
//! Warmup iterations run to completion before the first measured iteration.
//! Each iteration invokes the operation `batch_size` times back to back and
//! is timed as a whole, so the per-invocation cost is not swamped by the cost
//! of reading the clock.

use std::hint::black_box;
use std::time::{Duration, Instant};

use crate::metrics::SampleAggregate;

/// Result of one harness run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarnessRun {
    pub aggregate: SampleAggregate,
    /// Wall-clock time spent in warmup.
    pub warmup: Duration,
    /// Wall-clock time spent in measured iterations.
    pub measurement: Duration,
}

/// A benchmark harness for measuring operation latency.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkHarness {
    /// Number of warmup iterations before measurement
    warmup_iterations: u64,
    /// Number of measurement iterations
    measurement_iterations: u64,
    /// Invocations per iteration
    batch_size: u64,
}

impl BenchmarkHarness {
    /// Create a new benchmark harness with default settings.
    pub fn new() -> Self {
        Self {
            warmup_iterations: 5,
            measurement_iterations: 5,
            batch_size: 1_000,
        }
    }

    /// Set the number of warmup iterations.
    pub fn warmup(mut self, iterations: u64) -> Self {
        self.warmup_iterations = iterations;
        self
    }

    /// Set the number of measurement iterations.
    pub fn iterations(mut self, iterations: u64) -> Self {
        self.measurement_iterations = iterations;
        self
    }

    /// Set the number of invocations per iteration. Clamped to at least one.
    pub fn batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run a benchmark and aggregate its timing samples.
    ///
    /// The closure performs a single invocation of the operation being
    /// measured; its result is passed through `black_box`.
    pub fn run<F, T>(&self, mut operation: F) -> HarnessRun
    where
        F: FnMut() -> T,
    {
        // Warmup phase
        let warmup_start = Instant::now();
        for _ in 0..self.warmup_iterations {
            for _ in 0..self.batch_size {
                black_box(operation());
            }
        }
        let warmup = warmup_start.elapsed();

        // Measurement phase
        let mut aggregate = SampleAggregate::new();
        let measurement_start = Instant::now();
        for _ in 0..self.measurement_iterations {
            let start = Instant::now();
            for _ in 0..self.batch_size {
                black_box(operation());
            }
            aggregate.record(start.elapsed().as_nanos() as u64, self.batch_size);
        }
        let measurement = measurement_start.elapsed();

        HarnessRun {
            aggregate,
            warmup,
            measurement,
        }
    }
}

impl Default for BenchmarkHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Measure the execution time of a closure.
pub fn measure<F, T>(f: F) -> (T, Duration)
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    (result, elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::thread;

    #[test]
    fn test_harness_counts() {
        let calls = Cell::new(0u64);
        let run = BenchmarkHarness::new()
            .warmup(3)
            .iterations(4)
            .batch_size(10)
            .run(|| calls.set(calls.get() + 1));

        assert_eq!(calls.get(), (3 + 4) * 10);
        assert_eq!(run.aggregate.iterations, 4);
        assert_eq!(run.aggregate.invocations, 40);
    }

    #[test]
    fn test_warmup_completes_before_measurement() {
        let calls = Cell::new(0u64);
        let harness = BenchmarkHarness::new().warmup(2).iterations(3).batch_size(5);

        // Only the first warmup * batch invocations are slow.
        let run = harness.run(|| {
            calls.set(calls.get() + 1);
            if calls.get() <= 2 * 5 {
                thread::sleep(Duration::from_millis(1));
            }
        });

        assert!(run.warmup >= Duration::from_millis(2 * 5));
        assert!(run.aggregate.mean_ns().unwrap() < 500_000.0);
        assert!(run.aggregate.max_mean_ns.unwrap() < 500_000.0);
    }

    #[test]
    fn test_samples_reflect_operation_cost() {
        let run = BenchmarkHarness::new()
            .warmup(1)
            .iterations(3)
            .batch_size(2)
            .run(|| thread::sleep(Duration::from_micros(100)));

        assert!(run.aggregate.mean_ns().unwrap() >= 100_000.0);
        assert!(run.measurement >= Duration::from_micros(600));
    }

    #[test]
    fn test_zero_batch_is_clamped() {
        let run = BenchmarkHarness::new()
            .warmup(0)
            .iterations(2)
            .batch_size(0)
            .run(|| 1 + 1);
        assert_eq!(run.aggregate.invocations, 2);
    }

    #[test]
    fn test_measure() {
        let (result, duration) = measure(|| {
            thread::sleep(Duration::from_millis(5));
            42
        });

        assert_eq!(result, 42);
        assert!(duration >= Duration::from_millis(5));
    }
}
