// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `monobuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "monobuild",
    version,
    about = "Incremental build planning for multi-artifact repositories.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). Its directory is the repository root.
    #[arg(long, value_name = "PATH", default_value = "Monobuild.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MONOBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Detect changes and print what a build would do, without running it.
    Plan(PlanArgs),
    /// Print the pending jobs of the configured job store.
    ///
    /// The store is written by the program embedding the build engine with
    /// its own step executors; this binary only reads it.
    Status,
}

#[derive(Debug, Clone, Default, Args)]
pub struct PlanArgs {
    /// Build these artifacts and everything that depends on them.
    #[arg(long, value_name = "NAME", value_delimiter = ',')]
    pub from: Option<Vec<String>>,

    /// Build these artifacts and everything they depend on.
    #[arg(long, value_name = "NAME", value_delimiter = ',')]
    pub upto: Option<Vec<String>>,

    /// Build exactly these artifacts.
    #[arg(long, value_name = "NAME", value_delimiter = ',')]
    pub just_build: Option<Vec<String>>,

    /// Treat every artifact as changed.
    #[arg(long)]
    pub force: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
