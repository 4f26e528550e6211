use crate::cli::JobArgs;
use crate::support::{execute, load_scenario_or_exit, print_json_or_exit, report_or_exit};
use std::path::PathBuf;
use tremor_kernel::PulseKernel;
use tremor_runtime::build_database;

pub fn run(job: JobArgs, database: PathBuf) {
    let loaded = load_scenario_or_exit(&job);
    let progress_every = loaded.file.lookup.progress_every;
    let scenario = &loaded.scenario;
    let result = execute(&job, |ctx| {
        build_database(ctx, scenario, &PulseKernel, &database, progress_every)
    });
    let Some(report) = report_or_exit(result) else {
        return;
    };

    if job.json {
        print_json_or_exit(&serde_json::json!({
            "database": database.display().to_string(),
            "report": report,
        }));
    } else {
        println!("tremor database");
        println!("  Database: {}", database.display());
        println!("  Entries: {}", report.entries);
        println!("  Wall time: {:.3}s", report.perf.wall_seconds);
    }
}
