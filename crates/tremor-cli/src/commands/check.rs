use crate::cli::JobArgs;
use crate::support::{execute, load_scenario_or_exit, print_json_or_exit, report_or_exit};
use std::path::PathBuf;
use tremor_runtime::check_pairs;

const SAMPLE_LIMIT: usize = 25;

/// Exits 1 when any pair is uncovered.
pub fn run(job: JobArgs, database: PathBuf) {
    let loaded = load_scenario_or_exit(&job);
    let scenario = &loaded.scenario;
    let result = execute(&job, |ctx| check_pairs(ctx, scenario, &database));
    let Some(report) = report_or_exit(result) else {
        return;
    };

    if job.json {
        print_json_or_exit(&serde_json::json!({
            "database": database.display().to_string(),
            "covered": report.is_covered(),
            "report": report,
        }));
    } else {
        println!("tremor check");
        println!("  Database: {}", database.display());
        println!("  Pairs: {}", report.pairs);
        println!("  Canonical: {}", report.canonical);
        println!("  Uncovered: {}", report.uncovered.len());
        for pair in report.uncovered.iter().take(SAMPLE_LIMIT) {
            println!(
                "    - pair {} (station {}, source {})",
                pair.index, pair.station, pair.source
            );
        }
        if report.uncovered.len() > SAMPLE_LIMIT {
            println!("    ... {} more", report.uncovered.len() - SAMPLE_LIMIT);
        }
    }
    if !report.is_covered() {
        std::process::exit(1);
    }
}
