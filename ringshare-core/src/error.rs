use thiserror::Error;

/// All errors produced by ringshare-core.
#[derive(Debug, Error)]
pub enum RingError {
    #[error("could not allocate ring storage for {capacity} samples")]
    Allocation { capacity: usize },

    #[error("invalid ring capacity: {0}")]
    InvalidCapacity(usize),

    #[error("ring buffer is inactive: the shared session has ended")]
    InactiveBuffer,

    #[error("insufficient data: requested {requested} samples, {available} available")]
    InsufficientData { requested: usize, available: usize },

    #[error("worker is already running")]
    AlreadyRunning,

    #[error("worker is not running")]
    NotRunning,

    #[error("batch sink error: {0}")]
    Sink(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RingError {
    /// `true` for the "not enough buffered audio yet" signal.
    ///
    /// Pollers should wait and try again rather than surface it as a fault.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RingError::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, RingError>;
