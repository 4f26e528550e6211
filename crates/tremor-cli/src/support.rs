use crate::cli::{JobArgs, LookupArgs};
use crate::config::ScenarioFile;
use serde::Serialize;
use tremor_kernel::LookupStrategy;
use tremor_runtime::{RunError, RunOptions, Scenario, run_job};
use tremor_transport::{
    Communicator, ExecutionContext, LocalCluster, SendMode, TcpEndpoint, TransportError,
};

pub type JobContext = ExecutionContext<Box<dyn Communicator>>;

pub struct LoadedScenario {
    pub file: ScenarioFile,
    pub scenario: Scenario,
}

pub fn load_scenario_or_exit(job: &JobArgs) -> LoadedScenario {
    let file = ScenarioFile::load(&job.scenario).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    let scenario = file.scenario().unwrap_or_else(|e| {
        eprintln!("error: invalid scenario {}: {e}", job.scenario.display());
        std::process::exit(1);
    });
    LoadedScenario { file, scenario }
}

pub fn parse_send_mode_or_exit(raw: &str) -> SendMode {
    raw.parse().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

/// Scenario `[lookup]` settings with command-line overrides applied.
pub fn run_options_or_exit(file: &ScenarioFile, args: &LookupArgs) -> RunOptions {
    let mut options = file.run_options();
    if let Some(raw) = &args.lookup {
        options.lookup = raw.parse::<LookupStrategy>().unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        });
    }
    if let Some(threshold) = args.skip_threshold {
        options.skip_threshold = threshold;
    }
    options
}

pub fn print_json_or_exit<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => {
            eprintln!("error: failed to render json: {e}");
            std::process::exit(1);
        }
    }
}

/// Exits non-zero on a job error. TCP workers get `None` back.
pub fn report_or_exit<T>(result: Result<Option<T>, RunError>) -> Option<T> {
    match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// Runs `body` on every rank this process hosts.
///
/// With `--rank`/`--nprocs` this process is one rank of a TCP job; rank 0
/// binds `--coordinator` and the others dial it. Otherwise `--procs` ranks
/// (default one) run as threads of this process. Only rank 0 ever returns
/// `Some`.
pub fn execute<T, F>(job: &JobArgs, body: F) -> Result<Option<T>, RunError>
where
    T: Send,
    F: Fn(&mut JobContext) -> Result<Option<T>, RunError> + Sync,
{
    let mode = parse_send_mode_or_exit(&job.send_mode);
    match (job.rank, job.nprocs) {
        (Some(rank), Some(nprocs)) => {
            tracing::info!(rank, nprocs, coordinator = %job.coordinator, "joining tcp job");
            let comm: Box<dyn Communicator> = if rank == 0 {
                Box::new(TcpEndpoint::coordinator(job.coordinator.as_str(), nprocs)?)
            } else {
                Box::new(TcpEndpoint::worker(&job.coordinator, rank, nprocs)?)
            };
            run_job(comm, mode, &body)
        }
        _ => {
            let procs = job.procs.unwrap_or(1);
            tracing::debug!(procs, send_mode = %mode, "running ranks in process");
            let results = LocalCluster::run(procs, |endpoint| {
                let comm: Box<dyn Communicator> = Box::new(endpoint);
                run_job(comm, mode, &body)
            })?;
            first_failure_or_coordinator(results)
        }
    }
}

/// Rank 0's result unless some rank failed; a rank's own error wins over
/// the `Aborted` its peers observe.
fn first_failure_or_coordinator<T>(
    results: Vec<Result<Option<T>, RunError>>,
) -> Result<Option<T>, RunError> {
    let mut coordinator = None;
    let mut aborted = None;
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Err(RunError::Transport(err @ TransportError::Aborted { .. })) => {
                aborted.get_or_insert(RunError::Transport(err));
            }
            Err(err) => return Err(err),
            Ok(report) if rank == 0 => coordinator = Some(report),
            Ok(_) => {}
        }
    }
    match aborted {
        Some(err) => Err(err),
        None => Ok(coordinator.flatten()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_errors_win_over_observed_aborts() {
        let results: Vec<Result<Option<u8>, RunError>> = vec![
            Err(RunError::Transport(TransportError::Aborted {
                rank: 2,
                reason: "boom".to_string(),
            })),
            Ok(None),
            Err(RunError::Scenario("boom".to_string())),
        ];
        assert!(matches!(
            first_failure_or_coordinator(results),
            Err(RunError::Scenario(_))
        ));
    }

    #[test]
    fn coordinator_report_is_returned_when_every_rank_succeeds() {
        let results: Vec<Result<Option<u8>, RunError>> = vec![Ok(Some(7)), Ok(None), Ok(None)];
        assert_eq!(
            first_failure_or_coordinator(results).expect("job should succeed"),
            Some(7)
        );
    }
}
