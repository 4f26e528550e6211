//! Tremor CLI: the `tremor` command.

mod cli;
mod commands;
mod config;
mod logging;
mod support;
mod writer;

use clap::Parser;
use cli::{Cli, Commands};
use commands::run::RunArgs;
use tremor_runtime::RunMode;

fn main() {
    let cli = Cli::parse();
    logging::init();

    match cli.command {
        Commands::Pairs { job, database } => commands::pairs::run(job, database),

        Commands::Database { job, database } => commands::database::run(job, database),

        Commands::Run { job, output } => commands::run::run(RunArgs {
            mode: RunMode::Direct,
            job,
            lookup: None,
            database: None,
            output,
        }),

        Commands::RunFast {
            job,
            lookup,
            database,
            output,
        } => commands::run::run(RunArgs {
            mode: RunMode::Fast,
            job,
            lookup: Some(lookup),
            database: Some(database),
            output,
        }),

        Commands::RunFaster {
            job,
            lookup,
            database,
            output,
        } => commands::run::run(RunArgs {
            mode: RunMode::Faster,
            job,
            lookup: Some(lookup),
            database: Some(database),
            output,
        }),

        Commands::Check { job, database } => commands::check::run(job, database),
    }
}
