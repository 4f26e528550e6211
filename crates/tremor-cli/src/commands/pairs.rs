use crate::cli::JobArgs;
use crate::support::{execute, load_scenario_or_exit, print_json_or_exit, report_or_exit};
use std::path::PathBuf;
use tremor_runtime::build_pairs;

pub fn run(job: JobArgs, database: PathBuf) {
    let loaded = load_scenario_or_exit(&job);
    let config = loaded.file.dedup_config();
    let scenario = &loaded.scenario;
    let result = execute(&job, |ctx| build_pairs(ctx, scenario, &config, &database));
    let Some(report) = report_or_exit(result) else {
        return;
    };

    if job.json {
        print_json_or_exit(&serde_json::json!({
            "database": database.display().to_string(),
            "report": report,
        }));
    } else {
        println!("tremor pairs");
        println!("  Database: {}", database.display());
        println!("  Pairs: {}", report.pairs);
        println!("  Canonical: {}", report.canonical);
        println!("  Refinement rounds: {}", report.iterations.len());
        println!("  Scenario digest: {}", report.scenario_digest);
    }
}
