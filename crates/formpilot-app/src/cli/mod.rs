use std::path::PathBuf;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};

/// Top-level CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "formpilot",
    version,
    author,
    about = "Formpilot activity submission pipeline"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn print_help() {
        let mut cmd = Cli::command();
        let _ = cmd.print_help();
        println!();
    }
}

/// Supported subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a document of activities and submit each one through the form
    /// executor.
    Run(RunArgs),
}

/// How records are grouped during submission.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RunMode {
    /// One record at a time, no batch pauses.
    Sequential,
    /// Grouped into batches with pauses between them.
    Batched,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Source document holding the activity records.
    #[arg(value_name = "DOCUMENT")]
    pub document: PathBuf,
    /// Shorter waits and fewer page snapshots.
    #[arg(long)]
    pub fast: bool,
    /// Records per batch in batched mode (>= 1).
    #[arg(long, default_value_t = 3)]
    pub batch_size: usize,
    /// Submission grouping.
    #[arg(long, value_enum, default_value_t = RunMode::Batched)]
    pub mode: RunMode,
    /// Fill each form but stop before saving.
    #[arg(long)]
    pub confirm_before_save: bool,
    /// Prompt before each submission and between batches.
    #[arg(long)]
    pub interactive: bool,
    /// Print directives instead of driving the real executor.
    #[arg(long)]
    pub dry_run: bool,
}
