use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("ALREADY_EXISTS: {0}")]
    AlreadyExists(String),
    #[error("IN_USE: locked by user '{0}'")]
    InUse(String),
    #[error("CORRUPT: {0}")]
    Corrupt(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("SECURITY_VIOLATION: {0}")]
    Security(String),
    #[error("AMBIGUOUS_SELECTION: {0}")]
    AmbiguousSelection(String),
    #[error("DESTINATION_UNRESOLVED: {0}")]
    DestinationUnresolved(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    /// Identity of the holder reported by an `InUse` failure, if any.
    pub fn held_by(&self) -> Option<&str> {
        match self {
            Self::InUse(owner) => Some(owner),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
