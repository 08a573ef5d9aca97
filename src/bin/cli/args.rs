//! CLI argument structures.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Static-analysis driver with per-line message control
#[derive(Parser)]
#[command(name = "norn")]
#[command(version = VERSION)]
#[command(about = "Norn - pluggable static-analysis driver")]
#[command(long_about = "
Run the registered checkers over source files, with per-line control of
every diagnostic through inline pragmas and a map-reduce parallel mode
that reports exactly what a sequential run would.

Common Usage:

  # Check a directory with the default checkers
  norn check ./src

  # Parallel run, conventions silenced
  norn check --jobs 4 --disable C ./src

  # Only high-confidence findings
  norn check --confidence HIGH ./src

  # List every known diagnostic
  norn list-msgs
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check source files and report diagnostics
    Check(CheckArgs),

    /// List all registered diagnostics with ids and symbols
    #[command(name = "list-msgs")]
    ListMsgs,

    /// Print the default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,
}

/// Arguments for the `check` command.
#[derive(Args)]
pub struct CheckArgs {
    /// Files or directories to check
    pub paths: Vec<PathBuf>,

    /// Configuration file (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Worker count; 1 runs sequentially
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Disable messages by id, symbol, category letter, checker, or `all`
    #[arg(long, value_delimiter = ',')]
    pub disable: Vec<String>,

    /// Enable messages (applied after --disable)
    #[arg(long, value_delimiter = ',')]
    pub enable: Vec<String>,

    /// Confidence allow-list (HIGH, MEDIUM, LOW, UNDEFINED)
    #[arg(long, value_delimiter = ',')]
    pub confidence: Vec<String>,

    /// Minimum matching content lines for duplicate reporting
    #[arg(long)]
    pub min_similarity_lines: Option<usize>,

    /// Maximum physical line length
    #[arg(long)]
    pub max_line_length: Option<usize>,
}
