use thiserror::Error;

use crate::memory::FaultPoint;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row the operation depends on does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored column held a value the domain does not recognise.
    #[error("Invalid value '{value}' in column {column}")]
    InvalidColumn { column: &'static str, value: String },

    /// A query parameter cannot be sent to the database.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A failure injected into the in-memory store.
    #[error("Injected failure at {0:?}")]
    InjectedFailure(FaultPoint),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
