use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tremor",
    about = "Tremor: distributed synthetic seismograms over deduplicated source-receiver geometry",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// How this process joins a job, plus the scenario it runs.
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Scenario TOML file
    #[arg(long, default_value = "tremor.toml")]
    pub scenario: PathBuf,

    /// Run this many ranks as threads of this process
    #[arg(long, conflicts_with_all = ["rank", "nprocs"])]
    pub procs: Option<usize>,

    /// Rank of this process in a TCP job (0 coordinates)
    #[arg(long, requires = "nprocs")]
    pub rank: Option<usize>,

    /// Number of processes in a TCP job
    #[arg(long, requires = "rank")]
    pub nprocs: Option<usize>,

    /// Coordinator address: bound by rank 0, dialled by workers
    #[arg(long, default_value = "127.0.0.1:7878")]
    pub coordinator: String,

    /// Send mode: blocking or buffered
    #[arg(long, default_value = "blocking")]
    pub send_mode: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LookupArgs {
    /// Canonical entry chosen per pair: first, best or nearest
    #[arg(long)]
    pub lookup: Option<String>,

    /// Skipped pairs tolerated per rank before the job aborts
    #[arg(long)]
    pub skip_threshold: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deduplicate the pair set and write pairs.json
    Pairs {
        #[command(flatten)]
        job: JobArgs,

        /// Database directory
        #[arg(long, default_value = "greens_db")]
        database: PathBuf,
    },

    /// Compute raw tensors for every canonical pair
    Database {
        #[command(flatten)]
        job: JobArgs,

        /// Database directory
        #[arg(long, default_value = "greens_db")]
        database: PathBuf,
    },

    /// Evaluate the kernel for every pair
    Run {
        #[command(flatten)]
        job: JobArgs,

        /// Station output (JSONL)
        #[arg(long, default_value = "stations.jsonl")]
        output: PathBuf,
    },

    /// Pair-level run re-synthesizing from the database
    RunFast {
        #[command(flatten)]
        job: JobArgs,

        #[command(flatten)]
        lookup: LookupArgs,

        /// Database directory
        #[arg(long, default_value = "greens_db")]
        database: PathBuf,

        /// Station output (JSONL)
        #[arg(long, default_value = "stations.jsonl")]
        output: PathBuf,
    },

    /// Station-level run re-synthesizing from the database
    RunFaster {
        #[command(flatten)]
        job: JobArgs,

        #[command(flatten)]
        lookup: LookupArgs,

        /// Database directory
        #[arg(long, default_value = "greens_db")]
        database: PathBuf,

        /// Station output (JSONL)
        #[arg(long, default_value = "stations.jsonl")]
        output: PathBuf,
    },

    /// List pairs with no canonical entry within tolerance
    Check {
        #[command(flatten)]
        job: JobArgs,

        /// Database directory
        #[arg(long, default_value = "greens_db")]
        database: PathBuf,
    },
}
