// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI tool to run the resolution benchmarks and generate reports.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use resolvebench_benchmark::analysis::{self, DEFAULT_TOLERANCE};
use resolvebench_benchmark::fork::{self, ForkExecutor, WORKER_CONFIG_ENV};
use resolvebench_benchmark::{
    render_table, BenchmarkRunner, InProcessExecutor, JsonReporter, ProcessForkExecutor,
    RunError, RunOutcome, ScenarioMatrix,
};
use resolvebench_core::{BenchConfig, ConfigLoader, Isolation, RawBenchConfig};
use tracing_subscriber::EnvFilter;

/// Setup, fixture or integrity failure.
const EXIT_FATAL: u8 = 1;
/// Some scenario ended below the minimum sample count.
const EXIT_INSUFFICIENT: u8 = 2;
/// `compare` found a scenario outside the tolerance.
const EXIT_REGRESSION: u8 = 4;

#[derive(Parser)]
#[command(name = "run_benchmarks")]
#[command(author, version, about = "Measure name resolution latency through delegating resolvers")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark suite (default)
    Run(RunArgs),

    /// Print the scenario matrix
    List {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Local entry counts of the isolated topologies
        #[arg(long, value_delimiter = ',')]
        sizes: Option<Vec<usize>>,
    },

    /// List saved reports
    Reports {
        /// Directory holding benchmark data
        #[arg(short, long, default_value = "data")]
        output: PathBuf,
    },

    /// Compare two saved reports
    Compare {
        /// Reference report
        baseline: PathBuf,

        /// Report to check against the reference
        candidate: PathBuf,

        /// Maximum relative difference per scenario
        #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: PathBuf,
    },

    /// Run one fork of one scenario (spawned by the supervisor)
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        scenario: String,

        #[arg(long)]
        fork: u32,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for benchmark data
    #[arg(short, long, default_value = "data")]
    output: PathBuf,

    /// Forks per scenario
    #[arg(long)]
    forks: Option<u32>,

    /// Warmup iterations per fork
    #[arg(long)]
    warmup: Option<u32>,

    /// Measured iterations per fork
    #[arg(short, long)]
    iterations: Option<u32>,

    /// Invocations per iteration
    #[arg(long)]
    batch_size: Option<u64>,

    /// Local entry counts of the isolated topologies
    #[arg(long, value_delimiter = ',')]
    sizes: Option<Vec<usize>>,

    /// Output time unit (ns, us, ms, s)
    #[arg(long)]
    time_unit: Option<String>,

    /// average_time or throughput
    #[arg(long)]
    mode: Option<String>,

    /// process or in_process
    #[arg(long)]
    isolation: Option<String>,

    /// Wall-clock ceiling per fork in milliseconds
    #[arg(long)]
    fork_timeout_ms: Option<u64>,

    /// Only run scenarios whose name contains one of these patterns
    #[arg(short, long)]
    filter: Vec<String>,

    /// Run in quick mode (one fork, few iterations)
    #[arg(long)]
    quick: bool,

    /// Print the report as JSON on stdout instead of a table
    #[arg(long)]
    json: bool,

    /// Do not save the report to the output directory
    #[arg(long)]
    no_save: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let is_worker = matches!(cli.command, Some(Commands::Worker { .. }));
    init_logging(cli.verbose, is_worker);

    let result = match cli.command {
        None => run(cli.run),
        Some(Commands::Run(args)) => run(args),
        Some(Commands::List { config, sizes }) => list(config.as_deref(), sizes),
        Some(Commands::Reports { output }) => reports(&output),
        Some(Commands::Compare {
            baseline,
            candidate,
            tolerance,
        }) => compare(&baseline, &candidate, tolerance),
        Some(Commands::Validate { file }) => validate(&file),
        Some(Commands::Worker { scenario, fork }) => worker(&scenario, fork),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = format!("{:#}", e), "Benchmark failed");
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Logs go to stderr so stdout stays machine-parsable.
fn init_logging(verbose: bool, is_worker: bool) {
    let level = match (verbose, is_worker) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_raw(path: Option<&Path>) -> anyhow::Result<RawBenchConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            Ok(ConfigLoader::load_raw(&content)?)
        }
        None => Ok(RawBenchConfig::default()),
    }
}

fn load_config(args: &RunArgs) -> anyhow::Result<BenchConfig> {
    let mut raw = load_raw(args.config.as_deref())?;

    if args.quick {
        raw.forks = 1;
        raw.warmup_iterations = 1;
        raw.measurement_iterations = 3;
        raw.batch_size = 100;
    }
    if let Some(forks) = args.forks {
        raw.forks = forks;
    }
    if let Some(warmup) = args.warmup {
        raw.warmup_iterations = warmup;
    }
    if let Some(iterations) = args.iterations {
        raw.measurement_iterations = iterations;
    }
    if let Some(batch_size) = args.batch_size {
        raw.batch_size = batch_size;
    }
    if let Some(sizes) = &args.sizes {
        raw.repository_sizes = sizes.clone();
    }
    if let Some(unit) = &args.time_unit {
        raw.time_unit = unit.clone();
    }
    if let Some(mode) = &args.mode {
        raw.mode = mode.clone();
    }
    if let Some(isolation) = &args.isolation {
        raw.isolation = isolation.clone();
    }
    if let Some(timeout) = args.fork_timeout_ms {
        raw.fork_timeout_ms = timeout;
    }

    Ok(ConfigLoader::validate(raw)?)
}

fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let config = load_config(&args)?;
    let matrix = ScenarioMatrix::standard(&config.repository_sizes)?.filter(&args.filter);
    if matrix.is_empty() {
        anyhow::bail!("no scenario matches filters {:?}", args.filter);
    }

    tracing::info!(
        scenarios = matrix.len(),
        forks = config.forks,
        warmup = config.warmup_iterations,
        iterations = config.measurement_iterations,
        batch_size = config.batch_size,
        unit = %config.time_unit,
        mode = %config.mode,
        isolation = %config.isolation,
        "Starting resolution benchmark"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building async runtime")?;

    let outcome = match config.isolation {
        Isolation::Process => {
            let executor = ProcessForkExecutor::current_exe(&config)?;
            execute(&runtime, config.clone(), matrix, executor)?
        }
        Isolation::InProcess => {
            let executor = InProcessExecutor::new(config.clone());
            execute(&runtime, config.clone(), matrix, executor)?
        }
    };

    let report = &outcome.report;
    if !args.no_save {
        let reporter = JsonReporter::new(&args.output)?;
        reporter.save(report)?;
    }

    if args.json {
        serde_json::to_writer_pretty(std::io::stdout().lock(), report)?;
        println!();
    } else {
        print!("{}", render_table(report));
    }

    for violation in analysis::check_floor(report)
        .into_iter()
        .chain(analysis::check_scan_monotonic(report, DEFAULT_TOLERANCE))
    {
        tracing::warn!(
            scenario = %violation.scenario_name,
            reason = %violation.reason,
            "Report property violated"
        );
    }

    if outcome.complete {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_INSUFFICIENT))
    }
}

fn execute<E: ForkExecutor>(
    runtime: &tokio::runtime::Runtime,
    config: BenchConfig,
    matrix: ScenarioMatrix,
    executor: E,
) -> Result<RunOutcome, RunError> {
    let mut runner = BenchmarkRunner::new(config, matrix, executor);
    runtime.block_on(runner.run())
}

fn list(config: Option<&Path>, sizes: Option<Vec<usize>>) -> anyhow::Result<ExitCode> {
    let mut raw = load_raw(config)?;
    if let Some(sizes) = sizes {
        raw.repository_sizes = sizes;
    }
    let config = ConfigLoader::validate(raw)?;
    let matrix = ScenarioMatrix::standard(&config.repository_sizes)?;

    for scenario in matrix.iter() {
        println!(
            "{:<28} {:<14} {:<28} {}",
            scenario.name,
            scenario.target.to_string(),
            scenario.artifact.to_string(),
            scenario.expected
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn reports(output: &Path) -> anyhow::Result<ExitCode> {
    let reporter = JsonReporter::new(output)?;
    for path in reporter.list_reports()? {
        match JsonReporter::load(&path) {
            Ok(report) => println!(
                "{}  {}  {} scenarios{}",
                path.display(),
                report.timestamp.format("%Y-%m-%d %H:%M:%S"),
                report.entries.len(),
                if report.is_complete() { "" } else { " (incomplete)" }
            ),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Unreadable report"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn compare(baseline: &Path, candidate: &Path, tolerance: f64) -> anyhow::Result<ExitCode> {
    let before = JsonReporter::load(baseline)
        .with_context(|| format!("loading {}", baseline.display()))?;
    let after = JsonReporter::load(candidate)
        .with_context(|| format!("loading {}", candidate.display()))?;

    let comparison = analysis::compare(&before, &after, tolerance);
    for row in &comparison.rows {
        println!(
            "{} {:<28} {:>12.1}ns -> {:>12.1}ns  {:+.1}%",
            if row.within_tolerance { "✓" } else { "✗" },
            row.scenario_name,
            row.baseline,
            row.candidate,
            row.relative_change * 100.0
        );
    }
    for name in &comparison.skipped {
        println!("- {:<28} not comparable", name);
    }

    if comparison.within_tolerance() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_REGRESSION))
    }
}

fn validate(file: &Path) -> anyhow::Result<ExitCode> {
    tracing::info!(file = %file.display(), "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("  Forks:                  {}", config.forks);
            println!("  Warmup iterations:      {}", config.warmup_iterations);
            println!("  Measurement iterations: {}", config.measurement_iterations);
            println!("  Batch size:             {}", config.batch_size);
            println!("  Repository sizes:       {:?}", config.repository_sizes);
            println!("  Time unit:              {}", config.time_unit);
            println!("  Mode:                   {}", config.mode);
            println!("  Isolation:              {}", config.isolation);
            println!("  Fork timeout:           {}ms", config.fork_timeout_ms);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            Ok(ExitCode::from(EXIT_FATAL))
        }
    }
}

fn worker(scenario: &str, fork_index: u32) -> anyhow::Result<ExitCode> {
    let yaml = std::env::var(WORKER_CONFIG_ENV)
        .with_context(|| format!("{} is not set; workers are spawned by the runner", WORKER_CONFIG_ENV))?;
    let config = ConfigLoader::load_string(&yaml)?;

    let code = fork::worker_main(&config, scenario, fork_index);
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(EXIT_FATAL)))
}
