use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "docdelta",
    about = "Structural document diffs compiled into concurrency-safe store updates",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Field that identifies sequence elements (overrides the config file)
    #[arg(long, global = true)]
    pub identity_field: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the diff between two JSON documents
    Diff(DiffArgs),
    /// Compile the diff into a store update
    Update(UpdateArgs),
    /// Compile the diff and evaluate it in memory
    Apply(ApplyArgs),
}

#[derive(Args)]
pub struct Snapshots {
    /// Old snapshot (JSON object)
    pub old: PathBuf,
    /// New snapshot (JSON object)
    pub new: PathBuf,
}

#[derive(Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub snapshots: Snapshots,
}

#[derive(Args)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub snapshots: Snapshots,
    /// Emit a `$set` / `$unset` / `$push` update instead of a pipeline
    #[arg(long)]
    pub operators: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub snapshots: Snapshots,
    /// Document to apply the update to, standing in for a copy modified since OLD was read
    #[arg(long)]
    pub current: Option<PathBuf>,
    /// Apply the operator form instead of the pipeline
    #[arg(long)]
    pub operators: bool,
}
