use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote rejected the bearer token (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Any other non-success status.
    #[error("remote returned {status}: {reason}")]
    Status { status: u16, reason: String },

    /// The HTTP backend failed before a response arrived.
    #[error("transport error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
