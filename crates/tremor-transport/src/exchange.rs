//! Worker-to-coordinator result messages.
//!
//! Traces travel as two messages (length, then the `nt x 4` tensor). Only
//! `send_skip` sends a length of zero, and no data follows it.
//! Raw kernel output travels as three (length, `t0`, `nt x 9` tensor).

use crate::comm::Communicator;
use crate::context::ExecutionContext;
use crate::error::TransportError;
use crate::tags::{GREEN_DATA, GREEN_LEN, GREEN_T0, TRACE_DATA, TRACE_LEN, TagScheme};
use crate::wire;
use tremor_kernel::{GreenTensor, TimedTraces};

pub fn send_traces<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    dest: usize,
    unit: usize,
    traces: &TimedTraces,
) -> Result<(), TransportError> {
    // encode first: a length of zero would read as a skip
    let data = wire::encode_traces(traces)?;
    ctx.send(
        dest,
        TagScheme::Trace.tag(unit, TRACE_LEN),
        wire::encode_len(traces.len())?,
    )?;
    ctx.send(dest, TagScheme::Trace.tag(unit, TRACE_DATA), data)
}

/// Announces that `unit` produced nothing.
pub fn send_skip<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    dest: usize,
    unit: usize,
) -> Result<(), TransportError> {
    ctx.send(dest, TagScheme::Trace.tag(unit, TRACE_LEN), wire::encode_len(0)?)
}

/// `None` when the sender skipped the unit.
pub fn recv_traces<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    source: usize,
    unit: usize,
) -> Result<Option<TimedTraces>, TransportError> {
    let nt = wire::decode_len(&ctx.recv(source, TagScheme::Trace.tag(unit, TRACE_LEN))?)?;
    if nt == 0 {
        return Ok(None);
    }
    let bytes = ctx.recv(source, TagScheme::Trace.tag(unit, TRACE_DATA))?;
    wire::decode_traces(&bytes, nt).map(Some)
}

pub fn send_green<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    dest: usize,
    unit: usize,
    t0: f64,
    tensor: &GreenTensor,
) -> Result<(), TransportError> {
    ctx.send(
        dest,
        TagScheme::Green.tag(unit, GREEN_LEN),
        wire::encode_len(tensor.nt())?,
    )?;
    ctx.send(dest, TagScheme::Green.tag(unit, GREEN_T0), wire::encode_f64(t0))?;
    ctx.send(
        dest,
        TagScheme::Green.tag(unit, GREEN_DATA),
        wire::encode_tensor(tensor),
    )
}

pub fn recv_green<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    source: usize,
    unit: usize,
) -> Result<(f64, GreenTensor), TransportError> {
    let nt = wire::decode_len(&ctx.recv(source, TagScheme::Green.tag(unit, GREEN_LEN))?)?;
    let t0 = wire::decode_f64(&ctx.recv(source, TagScheme::Green.tag(unit, GREEN_T0))?)?;
    let bytes = ctx.recv(source, TagScheme::Green.tag(unit, GREEN_DATA))?;
    Ok((t0, wire::decode_tensor(&bytes, nt)?))
}
