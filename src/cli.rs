// src/cli.rs

//! Command-line flags of the `jobflow` binary.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `jobflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobflow",
    version,
    about = "Run a workflow of shell tasks connected through data files.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workflow file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Jobflow.toml")]
    pub config: String,

    /// Submit only this task instead of the whole workflow.
    #[arg(long, value_name = "NAME")]
    pub task: Option<String>,

    /// Run tasks even when their outputs are up to date.
    #[arg(long)]
    pub force: bool,

    /// Stop waiting for the submission after this many seconds.
    ///
    /// Tasks still running are not interrupted.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Verbosity of the logs written to stderr.
    ///
    /// Overrides `JOBFLOW_LOG`; without either, `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task waves, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the submission summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Values accepted by `--log-level`.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Parse `std::env::args`, exiting with usage on error.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
