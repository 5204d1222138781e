use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid object location '{0}': expected s3://<bucket>/<key>")]
    InvalidLocation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("{service} returned {status}: {body}")]
    Remote { service: String, status: u16, body: String },

    #[error("Request to {service} failed: {reason}")]
    Transport { service: String, reason: String },

    #[error("Failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("Malformed result record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Async job {handle} failed: {message}")]
    JobFailed { handle: String, message: String },

    #[error("Gave up waiting for async job {handle} after {polls} polls")]
    PollTimeout { handle: String, polls: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn parse(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Parse { what: what.into(), reason: reason.to_string() }
    }

    pub fn storage(reason: impl std::fmt::Display) -> Self {
        Self::Storage(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
