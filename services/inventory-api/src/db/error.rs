//! Database error types.

use stockroom_id::{InventoryId, ItemId};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or services/inventory-api.")]
    MigrationDirNotFound { tried: String, last_error: String },

    #[error("inventory not found: {0}")]
    InventoryNotFound(InventoryId),

    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// Another item in the inventory already holds this custom ID.
    #[error("custom ID '{custom_id}' already exists in inventory {inventory_id}")]
    DuplicateCustomId {
        inventory_id: InventoryId,
        custom_id: String,
    },

    /// The inventory's counter has handed out its largest value.
    #[error("sequence counter exhausted for inventory {0}")]
    SequenceExhausted(InventoryId),

    /// A stored row could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    /// Connection-class failures where retrying the same statement may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Connect(_) => true,
            DbError::Query(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ) || is_serialization_failure(e),
            _ => false,
        }
    }
}

/// SQLSTATE 40001 / 40P01: the statement lost a serialization race or deadlock.
fn is_serialization_failure(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

/// SQLSTATE 22003: numeric value out of range (a `BIGINT` counter overflowed).
pub(crate) fn is_numeric_out_of_range(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("22003"),
        _ => false,
    }
}

/// SQLSTATE 23505: unique constraint violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
