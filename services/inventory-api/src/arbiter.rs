//! Uniqueness arbiter.
//!
//! Custom IDs are unique within an inventory. The check and the write happen
//! in one atomic store operation, so two concurrent commits of the same ID
//! cannot both succeed.

use stockroom_id::{InventoryId, ItemId};
use thiserror::Error;
use tracing::debug;

use crate::db::{Database, DbError, ItemRecord, NewItem};

#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error("custom ID '{custom_id}' is already taken in inventory {inventory_id}")]
    Duplicate {
        inventory_id: InventoryId,
        custom_id: String,
    },

    #[error(transparent)]
    Storage(DbError),
}

impl From<DbError> for ArbiterError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::DuplicateCustomId {
                inventory_id,
                custom_id,
            } => ArbiterError::Duplicate {
                inventory_id,
                custom_id,
            },
            other => ArbiterError::Storage(other),
        }
    }
}

#[derive(Clone)]
pub struct UniquenessArbiter {
    db: Database,
}

impl UniquenessArbiter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persists a new item if its custom ID is free.
    pub async fn commit(&self, item: NewItem) -> Result<ItemRecord, ArbiterError> {
        let inventory_id = item.inventory_id;
        let custom_id = item.custom_id.clone();
        let record = self.db.store().insert_item(item).await?;
        debug!(inventory_id = %inventory_id, custom_id = %custom_id, item_id = %record.id, "Custom ID committed");
        Ok(record)
    }

    /// Moves an existing item to a new custom ID if it is free. Keeping the
    /// item's current ID is always allowed.
    pub async fn reassign(
        &self,
        inventory_id: &InventoryId,
        item_id: &ItemId,
        custom_id: &str,
    ) -> Result<ItemRecord, ArbiterError> {
        let record = self
            .db
            .store()
            .update_custom_id(inventory_id, item_id, custom_id)
            .await?;
        debug!(inventory_id = %inventory_id, item_id = %item_id, custom_id = %custom_id, "Custom ID reassigned");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use stockroom_id::SequenceValue;

    use super::*;
    use crate::db::{InventoryStore, MemoryStore, NewInventory};

    async fn setup() -> (UniquenessArbiter, InventoryId) {
        let store = MemoryStore::new();
        let id = InventoryId::new();
        store
            .create_inventory(NewInventory {
                id,
                name: "Books".to_string(),
                owner_email: "owner@example.com".to_string(),
            })
            .await
            .unwrap();
        (UniquenessArbiter::new(Database::from_store(store)), id)
    }

    fn item(inventory_id: InventoryId, custom_id: &str) -> NewItem {
        NewItem {
            id: ItemId::new(),
            inventory_id,
            name: "Dune".to_string(),
            custom_id: custom_id.to_string(),
            sequence_value: SequenceValue::FIRST,
            fields: serde_json::json!({}),
            created_by: "usr_test".to_string(),
        }
    }

    #[tokio::test]
    async fn second_commit_of_same_id_is_duplicate() {
        let (arbiter, id) = setup().await;
        arbiter.commit(item(id, "BK-1")).await.unwrap();

        let err = arbiter.commit(item(id, "BK-1")).await.unwrap_err();
        match err {
            ArbiterError::Duplicate { custom_id, .. } => assert_eq!(custom_id, "BK-1"),
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commits_of_same_id_admit_exactly_one() {
        let (arbiter, id) = setup().await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let arbiter = arbiter.clone();
            handles.push(tokio::spawn(async move {
                arbiter.commit(item(id, "RACE")).await
            }));
        }

        let mut committed = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(ArbiterError::Duplicate { .. }) => duplicates += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(committed, 1);
        assert_eq!(duplicates, 15);
    }

    #[tokio::test]
    async fn reassign_rejects_taken_id() {
        let (arbiter, id) = setup().await;
        let a = arbiter.commit(item(id, "A")).await.unwrap();
        arbiter.commit(item(id, "B")).await.unwrap();

        assert!(matches!(
            arbiter.reassign(&id, &a.id, "B").await,
            Err(ArbiterError::Duplicate { .. })
        ));
        assert_eq!(arbiter.reassign(&id, &a.id, "Z").await.unwrap().custom_id, "Z");
    }

    #[tokio::test]
    async fn missing_inventory_is_storage_error() {
        let (arbiter, _id) = setup().await;
        let err = arbiter.commit(item(InventoryId::new(), "A")).await.unwrap_err();
        assert!(matches!(
            err,
            ArbiterError::Storage(DbError::InventoryNotFound(_))
        ));
    }
}
