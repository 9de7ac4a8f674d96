use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("post not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DomainError {
    /// Returns the appropriate exit code for this error.
    /// 0 = success, 1 = general error, 2 = input error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DomainError::InvalidInput(_) | DomainError::Parse(_) => 2,
            _ => 1,
        }
    }

    /// Only transport failures are worth a consumer-initiated retry;
    /// a missing post stays missing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Transport(_))
    }
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Io(e.to_string())
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}
