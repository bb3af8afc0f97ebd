/// Storage errors
///
/// Backends translate their native failures into [`DbError`] so that use
/// cases can react to constraint violations without knowing which database
/// produced them.

/// Error raised by executors, repositories and transaction handles
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A unique constraint rejected the write
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// An update or delete addressed a row that does not exist
    #[error("row not found")]
    RowNotFound,

    /// The backend could not be reached or refused the operation
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other driver error
    #[error("database error: {0}")]
    Query(sqlx::Error),
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                }
            }
            sqlx::Error::RowNotFound => DbError::RowNotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DbError::Unavailable(err.to_string())
            }
            _ => DbError::Query(err),
        }
    }
}
