use tremor_kernel::KernelError;

/// Errors raised by the canonical pair database.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("{path}: I/O error: {message}")]
    Io { path: String, message: String },

    #[error("{path}:{line}: parse error: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted substrate: {0}")]
    Corrupt(String),

    #[error("database lock busy: {lock_path}")]
    LockBusy { lock_path: String },

    #[error("failed to acquire database lock {lock_path}: {message}")]
    LockIo { lock_path: String, message: String },

    #[error("database opened read-only")]
    ReadOnly,

    #[error("no pairs header at {0}")]
    MissingHeader(String),

    #[error("dataset not found: {0}")]
    MissingEntry(String),

    #[error("dataset {key} is not a {expected}")]
    WrongKind { key: String, expected: &'static str },

    #[error("malformed pairs header: {0}")]
    Malformed(String),

    #[error("database was built for scenario {found}, current scenario is {expected}")]
    ScenarioMismatch { expected: String, found: String },

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

impl DatabaseError {
    pub(crate) fn io(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
