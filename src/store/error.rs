use thiserror::Error as ThisError;

/// The `ClientStore` error taxonomy (spec §4.2). All other errors from a
/// backend propagate as `Unexpected`.
#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("no matching record")]
    NoRecords,
    #[error("bad request: {0:?}")]
    BadRequest(Vec<String>),
    #[error("conflict: a unique constraint was violated")]
    Conflict,
    #[error("maintenance mode does not support creation; retry once recovered")]
    CreateDuringMaintenance,
    #[error("unexpected store error: {0}")]
    Unexpected(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NoRecords,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict,
            other => StoreError::Unexpected(other.to_string()),
        }
    }
}
