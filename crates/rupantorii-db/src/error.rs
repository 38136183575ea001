//! # Storage Errors
//!
//! One error type for every public storage operation. Rule violations from
//! `rupantorii-core` pass through untouched as [`DbError::Domain`]; everything
//! else describes what SQLite refused.
//!
//! ```text
//!  price_order / plan_transition ──► CoreError ──┐
//!                                                ├──► DbError ──► code()
//!  sqlx / SQLite ──────────────────► sqlx::Error ┘
//! ```

use rupantorii_core::CoreError;
use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// No row with this id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A `UNIQUE` column already holds the value. `field` is the column as
    /// SQLite reports it (`table.column`) or the logical field name.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A row is still referenced (for example a variant that order items
    /// point at) or a reference points nowhere.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A `CHECK` constraint rejected the write, e.g. stock going negative.
    #[error("Constraint violated: {message}")]
    CheckViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected the statement for any other reason, including the
    /// ledger triggers that forbid rewriting order history.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),

    /// An order or stock rule was violated.
    #[error(transparent)]
    Domain(#[from] CoreError),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Stable machine-readable code for API layers.
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Domain(err) => err.code(),
            DbError::NotFound { .. } => "NOT_FOUND",
            DbError::UniqueViolation { .. } => "DUPLICATE",
            DbError::ForeignKeyViolation { .. } => "REFERENCED",
            DbError::CheckViolation { .. } => "CONSTRAINT",
            DbError::PoolExhausted => "BUSY",
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::Internal(_) => "INTERNAL",
        }
    }

    /// True when the error is a unique violation on `column`.
    pub(crate) fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.ends_with(column))
    }
}

/// ```text
/// RowNotFound                   → NotFound
/// Database(UniqueViolation)     → UniqueViolation { field: "table.column" }
/// Database(ForeignKeyViolation) → ForeignKeyViolation
/// Database(RESTRICT delete)     → ForeignKeyViolation
/// Database(CheckViolation)      → CheckViolation
/// Database(other)               → QueryFailed
/// PoolTimedOut                  → PoolExhausted
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => {
                        // "UNIQUE constraint failed: orders.order_number"
                        let field = message
                            .strip_prefix("UNIQUE constraint failed: ")
                            .unwrap_or("unknown")
                            .to_string();
                        DbError::UniqueViolation {
                            field,
                            value: "unknown".to_string(),
                        }
                    }
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    // ON DELETE RESTRICT reports SQLITE_CONSTRAINT_TRIGGER, which
                    // sqlx leaves as `Other`
                    ErrorKind::Other if message.starts_with("FOREIGN KEY constraint failed") => {
                        DbError::ForeignKeyViolation { message }
                    }
                    ErrorKind::CheckViolation => DbError::CheckViolation { message },
                    _ => DbError::QueryFailed(message),
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
