use tremor_kernel::ScheduleError;

/// Errors raised while moving messages between processes.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer went away before the expected message arrived.
    #[error("rank {peer} disconnected")]
    Disconnected { peer: usize },

    /// Another process aborted the job.
    #[error("job aborted by rank {rank}: {reason}")]
    Aborted { rank: usize, reason: String },

    #[error("rank {rank} cannot reach rank {dest}: {reason}")]
    Unreachable {
        rank: usize,
        dest: usize,
        reason: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("failed to connect to {addr}: {message}")]
    Connect { addr: String, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}
