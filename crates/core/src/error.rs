use mobilemed_types::{CpfError, ModalityError, TextError};

/// Errors raised by the record services.
///
/// The first three variants are caller-facing outcomes; the rest are infrastructure
/// failures that the API layer reports as internal errors.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("stored row is malformed: {0}")]
    CorruptRow(String),
}

impl RecordsError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<CpfError> for RecordsError {
    fn from(err: CpfError) -> Self {
        Self::Validation(format!("invalid nationalId: {err}"))
    }
}

impl From<ModalityError> for RecordsError {
    fn from(err: ModalityError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<TextError> for RecordsError {
    fn from(err: TextError) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type RecordsResult<T> = std::result::Result<T, RecordsError>;

/// Whether a store error is a violated `UNIQUE` constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Whether a store error is a violated `FOREIGN KEY` constraint.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
