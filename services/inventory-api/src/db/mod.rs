//! Persistence for inventories, identifier formats, sequence counters and items.
//!
//! This module provides:
//! - The [`InventoryStore`] trait: the atomic primitives the identifier engine
//!   relies on (counter increment, check-and-insert on custom IDs)
//! - [`PgStore`], backed by Postgres through SQLx
//! - [`MemoryStore`], a lock-based implementation for development and tests
//! - Idempotency key reservations for retry-safe item creation

mod error;
mod idempotency;
mod memory;
mod postgres;

pub use error::DbError;
pub use idempotency::{
    IdempotencyCheck, IdempotencyRecord, IdempotencyScope, StoreIdempotencyRecord,
    RESERVATION_TTL,
};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use stockroom_id::{InventoryId, ItemId, SequenceValue};
use stockroom_idformat::{IdentifierFormat, InventoryRole};

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of idle connections.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,

    /// Idle connection timeout.
    pub idle_timeout: Duration,

    /// Maximum lifetime of a connection.
    pub max_lifetime: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/stockroom".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl DbConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/stockroom".to_string());

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Self {
            database_url,
            max_connections,
            min_connections,
            ..Default::default()
        }
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone)]
pub struct NewInventory {
    pub id: InventoryId,
    pub name: String,
    pub owner_email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRecord {
    pub id: InventoryId,
    pub name: String,
    pub owner_email: String,
    pub id_format: IdentifierFormat,
    pub next_sequence: SequenceValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn id_settings(&self) -> IdSettings {
        IdSettings {
            id_format: self.id_format.clone(),
            next_sequence: self.next_sequence,
        }
    }
}

/// The per-inventory identifier state returned to clients after every format
/// save or item creation. `next_sequence` is advisory for previews only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdSettings {
    pub id_format: IdentifierFormat,
    pub next_sequence: SequenceValue,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub id: ItemId,
    pub inventory_id: InventoryId,
    pub name: String,
    pub custom_id: String,
    /// Counter value consumed by the creation attempt that produced this item.
    pub sequence_value: SequenceValue,
    /// Generic item attributes; opaque to the identifier engine.
    pub fields: serde_json::Value,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub id: ItemId,
    pub inventory_id: InventoryId,
    pub name: String,
    pub custom_id: String,
    pub sequence_value: SequenceValue,
    pub fields: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Store
// =============================================================================

/// Durable storage for the identifier engine.
///
/// Implementations must make `advance_sequence` a single atomic
/// read-modify-write, and make `insert_item` / `update_custom_id` a single
/// atomic check-and-write against the `(inventory_id, custom_id)` index.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Creates an inventory with an empty format, a counter at 1, and the
    /// owner registered as a member.
    async fn create_inventory(&self, new: NewInventory) -> Result<InventoryRecord, DbError>;

    async fn get_inventory(&self, inventory_id: &InventoryId) -> Result<InventoryRecord, DbError>;

    /// Grants (or changes) a member's role.
    async fn put_member(
        &self,
        inventory_id: &InventoryId,
        email: &str,
        role: InventoryRole,
    ) -> Result<(), DbError>;

    async fn member_role(
        &self,
        inventory_id: &InventoryId,
        email: &str,
    ) -> Result<Option<InventoryRole>, DbError>;

    async fn id_settings(&self, inventory_id: &InventoryId) -> Result<IdSettings, DbError> {
        Ok(self.get_inventory(inventory_id).await?.id_settings())
    }

    /// Replaces the format. Last write wins.
    async fn save_id_format(
        &self,
        inventory_id: &InventoryId,
        format: &IdentifierFormat,
    ) -> Result<IdSettings, DbError>;

    /// Atomically hands out the current counter value and advances it by one.
    async fn advance_sequence(&self, inventory_id: &InventoryId)
        -> Result<SequenceValue, DbError>;

    /// Inserts the item unless another item in the inventory already holds its
    /// custom ID, in which case `DbError::DuplicateCustomId`.
    async fn insert_item(&self, item: NewItem) -> Result<ItemRecord, DbError>;

    async fn update_custom_id(
        &self,
        inventory_id: &InventoryId,
        item_id: &ItemId,
        custom_id: &str,
    ) -> Result<ItemRecord, DbError>;

    async fn get_item(
        &self,
        inventory_id: &InventoryId,
        item_id: &ItemId,
    ) -> Result<ItemRecord, DbError>;

    /// Atomically reserves the key unless a live record already holds it.
    /// `IdempotencyCheck::NotFound` means the caller now owns the reservation;
    /// a pending record older than `RESERVATION_TTL` is taken over.
    async fn reserve_idempotency(
        &self,
        scope: &IdempotencyScope,
        request_hash: &str,
    ) -> Result<IdempotencyCheck, DbError>;

    /// Completes a reservation with the response. A completed record is kept.
    async fn store_idempotency(&self, record: StoreIdempotencyRecord) -> Result<(), DbError>;

    /// Drops a pending reservation so the request can be retried.
    async fn release_idempotency(&self, scope: &IdempotencyScope) -> Result<(), DbError>;

    async fn health_check(&self) -> Result<(), DbError>;
}

/// Handle to the configured store.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn InventoryStore>,
}

impl Database {
    pub fn in_memory() -> Self {
        Self::from_store(MemoryStore::new())
    }

    pub fn from_store(store: impl InventoryStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &dyn InventoryStore {
        self.store.as_ref()
    }

    /// Check if the database is reachable.
    pub async fn health_check(&self) -> Result<(), DbError> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
    }

    #[test]
    fn id_settings_serialize_camel_case() {
        let settings = IdSettings {
            id_format: IdentifierFormat::empty(),
            next_sequence: SequenceValue::FIRST,
        };
        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            serde_json::json!({"idFormat": [], "nextSequence": 1})
        );
    }
}
