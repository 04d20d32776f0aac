use thiserror::Error;

pub type Result<T> = std::result::Result<T, MintError>;

/// Infrastructure and request errors.
///
/// Business-rule rejections (sale not active, cap exceeded, ...) are not
/// errors; they are reported through the outcome enums of each operation.
#[derive(Debug, Error)]
pub enum MintError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("deadline exceeded before commit")]
    DeadlineExceeded,

    #[error("chain submission failed: {0}")]
    Chain(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MintError {
    /// Whether resubmitting the identical request may succeed: lock
    /// contention, an expired deadline or a transport failure.
    pub fn is_transient(&self) -> bool {
        match self {
            MintError::Database(error) => is_busy(error),
            MintError::DeadlineExceeded | MintError::Io(_) | MintError::Http(_) => true,
            _ => false,
        }
    }
}

fn is_busy(error: &rusqlite::Error) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}
