//! Error types and Result alias for the signal-to-execution pipeline

use thiserror::Error;

/// Main error type shared across every pipeline component
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("rate limiter timeout waiting for {endpoint}")]
    RateTimeout { endpoint: String },

    #[error("request queue timeout after {0}ms")]
    EnqueueTimeout(u64),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("exchange error {code}: {msg}")]
    ExchangeError { code: i64, msg: String },

    #[error("validation failed: {0:?}")]
    ValidationFailure(Vec<String>),

    #[error("signal stale (age {age_secs}s)")]
    SignalStale { age_secs: u64 },

    #[error("duplicate signal for {symbol} within dedup window")]
    SignalDuplicate { symbol: String },

    #[error("signal expired at {0}")]
    SignalExpired(chrono::DateTime<chrono::Utc>),

    #[error("circuit breaker open, resumes at {resume_at}")]
    CircuitBreakerOpen {
        resume_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("state inconsistency: {0}")]
    StateInconsistency(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("position already exists for {0}")]
    PositionExists(String),

    #[error("queue is full (max {0})")]
    QueueFull(usize),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Stable code string surfaced to observers (UI, logs) per the error-handling design.
    pub fn code(&self) -> &'static str {
        match self {
            Error::RateTimeout { .. } => "RATE_TIMEOUT",
            Error::EnqueueTimeout(_) => "ENQUEUE_TIMEOUT",
            Error::TransportError(_) => "TRANSPORT_ERROR",
            Error::ExchangeError { .. } => "EXCHANGE_ERROR",
            Error::ValidationFailure(_) => "VALIDATION_FAILURE",
            Error::SignalStale { .. } => "SIGNAL_STALE",
            Error::SignalDuplicate { .. } => "SIGNAL_DUPLICATE",
            Error::SignalExpired(_) => "SIGNAL_EXPIRED",
            Error::CircuitBreakerOpen { .. } => "CIRCUIT_BREAKER_OPEN",
            Error::StateInconsistency(_) => "STATE_INCONSISTENCY",
            Error::DatabaseError(_) => "DATABASE_ERROR",
            Error::InvalidData(_) => "INVALID_DATA",
            Error::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Error::PositionExists(_) => "POSITION_EXISTS",
            Error::QueueFull(_) => "QUEUE_FULL",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Unknown(_) => "UNKNOWN",
        }
    }

    /// Whether a retry policy may reattempt the call that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransportError(_) | Error::RateTimeout { .. } | Error::EnqueueTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}
