use crate::error::RunError;
use tremor_transport::{Communicator, ExecutionContext, SendMode};

/// Runs `body` on this rank. A clean return finishes the endpoint; an error
/// aborts every process of the job before it is returned.
pub fn run_job<C, T>(
    comm: C,
    send_mode: SendMode,
    body: impl FnOnce(&mut ExecutionContext<C>) -> Result<T, RunError>,
) -> Result<T, RunError>
where
    C: Communicator,
{
    let mut ctx = ExecutionContext::new(comm, send_mode)?;
    tracing::debug!(
        rank = ctx.rank(),
        nprocs = ctx.nprocs(),
        send_mode = %ctx.send_mode(),
        "job started"
    );
    match body(&mut ctx) {
        Ok(value) => {
            ctx.finish()?;
            Ok(value)
        }
        Err(err) => {
            ctx.abort(&err.to_string());
            Err(err)
        }
    }
}
