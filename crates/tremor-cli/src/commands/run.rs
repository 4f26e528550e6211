use crate::cli::{JobArgs, LookupArgs};
use crate::support::{
    JobContext, execute, load_scenario_or_exit, print_json_or_exit, report_or_exit,
    run_options_or_exit,
};
use crate::writer::JsonlStationWriter;
use std::path::PathBuf;
use tremor_kernel::PulseKernel;
use tremor_runtime::{
    MemoryWriter, RunError, RunMode, RunOptions, RunReport, Scenario, StationWriter, run_direct,
    run_fast, run_faster,
};

/// Database-backed runs name the database; the direct run does not.
pub struct RunArgs {
    pub mode: RunMode,
    pub job: JobArgs,
    pub lookup: Option<LookupArgs>,
    pub database: Option<PathBuf>,
    pub output: PathBuf,
}

pub fn run(args: RunArgs) {
    let loaded = load_scenario_or_exit(&args.job);
    let options = match &args.lookup {
        Some(lookup) => run_options_or_exit(&loaded.file, lookup),
        None => loaded.file.run_options(),
    };
    let scenario = &loaded.scenario;
    let result = execute(&args.job, |ctx| dispatch(ctx, &args, scenario, &options));
    let Some(report) = report_or_exit(result) else {
        return;
    };

    if args.job.json {
        print_json_or_exit(&serde_json::json!({
            "output": args.output.display().to_string(),
            "report": report,
        }));
    } else {
        println!("tremor {}", report.mode.as_str());
        println!("  Output: {}", args.output.display());
        println!("  Processes: {}", report.nprocs);
        println!("  Stations: {}", report.stations);
        println!("  Pairs: {}", report.pairs);
        println!("  Skipped: {}", report.skipped);
        println!("  Wall time: {:.3}s", report.perf.wall_seconds);
    }
}

fn dispatch(
    ctx: &mut JobContext,
    args: &RunArgs,
    scenario: &Scenario,
    options: &RunOptions,
) -> Result<Option<RunReport>, RunError> {
    // only the coordinator writes stations
    let mut writer: Box<dyn StationWriter> = if ctx.is_coordinator() {
        Box::new(JsonlStationWriter::create(&args.output)?)
    } else {
        Box::new(MemoryWriter::new())
    };
    let writer = writer.as_mut();
    match (args.mode, args.database.as_deref()) {
        (RunMode::Direct, _) => run_direct(ctx, scenario, &PulseKernel, writer, options),
        (RunMode::Fast, Some(dir)) => run_fast(ctx, scenario, &PulseKernel, dir, writer, options),
        (RunMode::Faster, Some(dir)) => {
            run_faster(ctx, scenario, &PulseKernel, dir, writer, options)
        }
        (mode, None) => Err(RunError::Scenario(format!(
            "{} run needs a database directory",
            mode.as_str()
        ))),
    }
}
