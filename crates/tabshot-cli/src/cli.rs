//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tabshot CLI - Extract tables from screenshot directories.
#[derive(Debug, Parser)]
#[command(name = "tabshot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "TABSHOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (totals only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every task directory under a root
    Run(RunArgs),

    /// Run a single task directory
    Task(TaskArgs),

    /// Show progress of every task under a root without calling the backend
    Status(StatusArgs),

    /// Validate a task's schema binding and print its response schema
    Schema(SchemaArgs),
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Root directory holding task directories
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Cap on screenshots sent to the backend per task
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for the task command.
#[derive(Debug, Parser)]
pub struct TaskArgs {
    /// Task directory
    pub dir: PathBuf,

    /// Cap on screenshots sent to the backend
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for the status command.
#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Root directory holding task directories
    #[arg(default_value = ".")]
    pub root: PathBuf,
}

/// Arguments for the schema command.
#[derive(Debug, Parser)]
pub struct SchemaArgs {
    /// Task directory
    pub dir: PathBuf,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl Cli {
    /// Default log filter for the requested verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
