//! vecdiff: differential tester for an external vectorizer
//!
//! # Usage
//!
//! ```bash
//! # Run every case under suite/
//! vecdiff
//!
//! # Run selected cases with a deadline per tool invocation
//! vecdiff 'suite/add-*.c' --timeout 30
//!
//! # Four cases at a time, keeping native assembly of each transformed module
//! vecdiff --jobs 4 --inspect
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use vd_cli::{
    config::{self, Overrides},
    diagnostics::{render_cli_error, setup_error_reporting},
    report, CliError, Result,
};
use vd_harness::{SystemRunner, TestDriver};

#[derive(Parser)]
#[command(
    name = "vecdiff",
    version = env!("CARGO_PKG_VERSION"),
    about = "Differential tester for an external vectorizer",
    long_about = r#"
Compiles each test case to IR, runs the vectorizer on it in whole-function
(wfv) or outer-loop (loop) mode, links the result with a launcher and checks
that scalar and vectorized code agree.

Test cases are named <prefix>-<mode>-<launchCode>_<param>.<ext>.

EXAMPLES:
    vecdiff                               # Run suite/*.c*
    vecdiff 'suite/*-wfv-*.c'             # Only whole-function cases
    vecdiff -C rv/test --jobs 8           # Run elsewhere, in parallel
    "#
)]
struct Cli {
    /// Glob patterns selecting test cases [default: suite/*.c*]
    patterns: Vec<String>,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    quiet: bool,

    /// Set log level (overrides --verbose/--quiet)
    #[arg(long, value_enum)]
    log: Option<LogLevel>,

    /// Set log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Working directory
    #[arg(short = 'C', long)]
    directory: Option<PathBuf>,

    /// Kill any tool or launcher still running after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Number of test cases processed concurrently
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Also emit native assembly for every transformed module
    #[arg(long)]
    inspect: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_error_reporting()?;
    setup_logging(cli.verbose, cli.quiet, cli.log, cli.log_format);

    match run(cli) {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            if !render_cli_error(&e) {
                error!("{}", e);
            }
            std::process::exit(1);
        }
    }
}

/// Returns whether every case passed.
fn run(cli: Cli) -> Result<bool> {
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir).map_err(CliError::Io)?;
    }

    let mut config = config::load(cli.config.as_deref())?;
    Overrides {
        patterns: cli.patterns,
        timeout_secs: cli.timeout,
        jobs: cli.jobs,
        inspect: cli.inspect,
    }
    .apply(&mut config);

    let runner = Arc::new(SystemRunner::new().with_timeout(config.run.timeout()));
    let driver = TestDriver::new(runner, &config);

    if !cli.quiet {
        println!("{}", report::banner());
    }
    let summary = driver.run_patterns(&config.run.patterns, &report::print_case)?;
    if !cli.quiet {
        println!("{}", report::format_summary(&summary));
    }
    info!(
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        "Run finished"
    );

    Ok(summary.all_passed())
}

fn setup_logging(verbose: u8, quiet: bool, log_level: Option<LogLevel>, log_format: LogFormat) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if let Some(level) = log_level {
        EnvFilter::new(match level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    } else if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true);

    match log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(formatter)
                .with(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(formatter.json())
                .with(filter)
                .init();
        }
    }
}
