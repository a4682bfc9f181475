//! In-memory store for development and tests.
//!
//! All state sits behind one `RwLock`. Every mutation takes the write lock for
//! its whole read-check-write, which gives the same atomicity the Postgres
//! store gets from row locks and the unique index.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stockroom_id::{InventoryId, ItemId, SequenceValue};
use stockroom_idformat::{IdentifierFormat, InventoryRole};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    DbError, IdSettings, IdempotencyCheck, IdempotencyRecord, IdempotencyScope, InventoryRecord,
    InventoryStore, ItemRecord, NewInventory, NewItem, StoreIdempotencyRecord, RESERVATION_TTL,
};

#[derive(Default)]
struct MemoryState {
    inventories: HashMap<InventoryId, InventoryRecord>,
    members: HashMap<(InventoryId, String), InventoryRole>,
    items: HashMap<ItemId, ItemRecord>,
    custom_ids: HashMap<(InventoryId, String), ItemId>,
    /// Records with the time their key was reserved.
    idempotency: HashMap<IdempotencyScope, (IdempotencyRecord, DateTime<Utc>)>,
}

/// Cloning yields another handle to the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    counter_outage: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, `advance_sequence` fails with a transient pool error.
    pub fn set_counter_outage(&self, down: bool) {
        self.counter_outage.store(down, Ordering::SeqCst);
    }

    /// Moves an inventory's counter, e.g. to restore it from an export.
    pub async fn set_next_sequence(
        &self,
        inventory_id: &InventoryId,
        next: SequenceValue,
    ) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        let inventory = state
            .inventories
            .get_mut(inventory_id)
            .ok_or(DbError::InventoryNotFound(*inventory_id))?;
        inventory.next_sequence = next;
        Ok(())
    }

    /// Number of items currently stored in an inventory.
    pub async fn item_count(&self, inventory_id: &InventoryId) -> usize {
        let state = self.state.read().await;
        state
            .items
            .values()
            .filter(|item| item.inventory_id == *inventory_id)
            .count()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn create_inventory(&self, new: NewInventory) -> Result<InventoryRecord, DbError> {
        let now = Utc::now();
        let record = InventoryRecord {
            id: new.id,
            name: new.name,
            owner_email: new.owner_email.clone(),
            id_format: IdentifierFormat::empty(),
            next_sequence: SequenceValue::FIRST,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        state.inventories.insert(record.id, record.clone());
        state
            .members
            .insert((record.id, new.owner_email), InventoryRole::Owner);
        Ok(record)
    }

    async fn get_inventory(&self, inventory_id: &InventoryId) -> Result<InventoryRecord, DbError> {
        let state = self.state.read().await;
        state
            .inventories
            .get(inventory_id)
            .cloned()
            .ok_or(DbError::InventoryNotFound(*inventory_id))
    }

    async fn put_member(
        &self,
        inventory_id: &InventoryId,
        email: &str,
        role: InventoryRole,
    ) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        if !state.inventories.contains_key(inventory_id) {
            return Err(DbError::InventoryNotFound(*inventory_id));
        }
        state
            .members
            .insert((*inventory_id, email.to_string()), role);
        Ok(())
    }

    async fn member_role(
        &self,
        inventory_id: &InventoryId,
        email: &str,
    ) -> Result<Option<InventoryRole>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .members
            .get(&(*inventory_id, email.to_string()))
            .copied())
    }

    async fn save_id_format(
        &self,
        inventory_id: &InventoryId,
        format: &IdentifierFormat,
    ) -> Result<IdSettings, DbError> {
        let mut state = self.state.write().await;
        let inventory = state
            .inventories
            .get_mut(inventory_id)
            .ok_or(DbError::InventoryNotFound(*inventory_id))?;
        inventory.id_format = format.clone();
        inventory.updated_at = Utc::now();
        Ok(inventory.id_settings())
    }

    async fn advance_sequence(
        &self,
        inventory_id: &InventoryId,
    ) -> Result<SequenceValue, DbError> {
        if self.counter_outage.load(Ordering::SeqCst) {
            return Err(DbError::Query(sqlx::Error::PoolTimedOut));
        }

        let mut state = self.state.write().await;
        let inventory = state
            .inventories
            .get_mut(inventory_id)
            .ok_or(DbError::InventoryNotFound(*inventory_id))?;
        let handed_out = inventory.next_sequence;
        inventory.next_sequence = handed_out
            .next()
            .ok_or(DbError::SequenceExhausted(*inventory_id))?;
        debug!(inventory_id = %inventory_id, value = %handed_out, "Advanced sequence");
        Ok(handed_out)
    }

    async fn insert_item(&self, item: NewItem) -> Result<ItemRecord, DbError> {
        let mut state = self.state.write().await;
        if !state.inventories.contains_key(&item.inventory_id) {
            return Err(DbError::InventoryNotFound(item.inventory_id));
        }

        let key = (item.inventory_id, item.custom_id.clone());
        if state.custom_ids.contains_key(&key) {
            return Err(DbError::DuplicateCustomId {
                inventory_id: item.inventory_id,
                custom_id: item.custom_id,
            });
        }

        let now = Utc::now();
        let record = ItemRecord {
            id: item.id,
            inventory_id: item.inventory_id,
            name: item.name,
            custom_id: item.custom_id,
            sequence_value: item.sequence_value,
            fields: item.fields,
            created_by: item.created_by,
            created_at: now,
            updated_at: now,
        };
        state.custom_ids.insert(key, record.id);
        state.items.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_custom_id(
        &self,
        inventory_id: &InventoryId,
        item_id: &ItemId,
        custom_id: &str,
    ) -> Result<ItemRecord, DbError> {
        let mut state = self.state.write().await;
        let old_key = match state.items.get(item_id) {
            Some(item) if item.inventory_id == *inventory_id => {
                (item.inventory_id, item.custom_id.clone())
            }
            _ => return Err(DbError::ItemNotFound(*item_id)),
        };

        let new_key = (*inventory_id, custom_id.to_string());
        match state.custom_ids.get(&new_key) {
            Some(holder) if holder != item_id => {
                return Err(DbError::DuplicateCustomId {
                    inventory_id: *inventory_id,
                    custom_id: custom_id.to_string(),
                });
            }
            _ => {}
        }

        state.custom_ids.remove(&old_key);
        state.custom_ids.insert(new_key, *item_id);

        let item = state
            .items
            .get_mut(item_id)
            .ok_or(DbError::ItemNotFound(*item_id))?;
        item.custom_id = custom_id.to_string();
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn get_item(
        &self,
        inventory_id: &InventoryId,
        item_id: &ItemId,
    ) -> Result<ItemRecord, DbError> {
        let state = self.state.read().await;
        state
            .items
            .get(item_id)
            .filter(|item| item.inventory_id == *inventory_id)
            .cloned()
            .ok_or(DbError::ItemNotFound(*item_id))
    }

    async fn reserve_idempotency(
        &self,
        scope: &IdempotencyScope,
        request_hash: &str,
    ) -> Result<IdempotencyCheck, DbError> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        if let Some((record, reserved_at)) = state.idempotency.get(scope) {
            let stale = record.response_status_code.is_none()
                && (now - *reserved_at)
                    .to_std()
                    .is_ok_and(|age| age >= RESERVATION_TTL);
            if !stale {
                return Ok(IdempotencyCheck::evaluate(
                    Some(record.clone()),
                    request_hash,
                ));
            }
        }

        let pending = IdempotencyRecord {
            request_hash: request_hash.to_string(),
            response_status_code: None,
            response_body: None,
        };
        state.idempotency.insert(scope.clone(), (pending, now));
        Ok(IdempotencyCheck::NotFound)
    }

    async fn store_idempotency(&self, record: StoreIdempotencyRecord) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        let completed = IdempotencyRecord {
            request_hash: record.request_hash,
            response_status_code: Some(record.response_status_code),
            response_body: record.response_body,
        };
        match state.idempotency.entry(record.scope) {
            Entry::Occupied(mut entry) => {
                let (existing, _) = entry.get_mut();
                if existing.response_status_code.is_none()
                    && existing.request_hash == completed.request_hash
                {
                    *existing = completed;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert((completed, Utc::now()));
            }
        }
        Ok(())
    }

    async fn release_idempotency(&self, scope: &IdempotencyScope) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        if state
            .idempotency
            .get(scope)
            .is_some_and(|(record, _)| record.response_status_code.is_none())
        {
            state.idempotency.remove(scope);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn inventory(store: &MemoryStore) -> InventoryId {
        let id = InventoryId::new();
        store
            .create_inventory(NewInventory {
                id,
                name: "Lab equipment".to_string(),
                owner_email: "owner@example.com".to_string(),
            })
            .await
            .unwrap();
        id
    }

    fn new_item(inventory_id: InventoryId, custom_id: &str) -> NewItem {
        NewItem {
            id: ItemId::new(),
            inventory_id,
            name: "Microscope".to_string(),
            custom_id: custom_id.to_string(),
            sequence_value: SequenceValue::FIRST,
            fields: serde_json::json!({}),
            created_by: "usr_test".to_string(),
        }
    }

    #[tokio::test]
    async fn new_inventory_starts_at_one_with_owner() {
        let store = MemoryStore::new();
        let id = inventory(&store).await;

        let settings = store.id_settings(&id).await.unwrap();
        assert_eq!(settings.next_sequence, SequenceValue::FIRST);
        assert!(settings.id_format.is_empty());
        assert_eq!(
            store.member_role(&id, "owner@example.com").await.unwrap(),
            Some(InventoryRole::Owner)
        );
    }

    #[tokio::test]
    async fn advance_hands_out_then_increments() {
        let store = MemoryStore::new();
        let id = inventory(&store).await;

        assert_eq!(store.advance_sequence(&id).await.unwrap().value(), 1);
        assert_eq!(store.advance_sequence(&id).await.unwrap().value(), 2);
        assert_eq!(store.id_settings(&id).await.unwrap().next_sequence.value(), 3);
    }

    #[tokio::test]
    async fn exhausted_counter_never_repeats_a_value() {
        let store = MemoryStore::new();
        let id = inventory(&store).await;
        store.set_next_sequence(&id, SequenceValue::MAX).await.unwrap();

        let err = store.advance_sequence(&id).await.unwrap_err();
        assert!(matches!(err, DbError::SequenceExhausted(_)));
        assert_eq!(
            store.id_settings(&id).await.unwrap().next_sequence,
            SequenceValue::MAX
        );
        assert!(store.advance_sequence(&id).await.is_err());
    }

    fn scope(key: &str) -> IdempotencyScope {
        IdempotencyScope {
            inventory_id: "inv_test".to_string(),
            actor_id: "usr_test".to_string(),
            endpoint_name: "items.create".to_string(),
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn idempotency_key_is_reserved_until_completed_or_released() {
        let store = MemoryStore::new();
        let key = scope("create-item-0001");

        assert!(matches!(
            store.reserve_idempotency(&key, "hash-a").await.unwrap(),
            IdempotencyCheck::NotFound
        ));
        assert!(matches!(
            store.reserve_idempotency(&key, "hash-a").await.unwrap(),
            IdempotencyCheck::InProgress
        ));
        assert!(matches!(
            store.reserve_idempotency(&key, "hash-b").await.unwrap(),
            IdempotencyCheck::Conflict
        ));

        store.release_idempotency(&key).await.unwrap();
        assert!(matches!(
            store.reserve_idempotency(&key, "hash-a").await.unwrap(),
            IdempotencyCheck::NotFound
        ));

        store
            .store_idempotency(StoreIdempotencyRecord {
                scope: key.clone(),
                request_hash: "hash-a".to_string(),
                response_status_code: 201,
                response_body: Some(serde_json::json!({"customId": "A-1"})),
            })
            .await
            .unwrap();
        store.release_idempotency(&key).await.unwrap();

        match store.reserve_idempotency(&key, "hash-a").await.unwrap() {
            IdempotencyCheck::Found(record) => {
                assert_eq!(record.response_status_code, Some(201));
                assert_eq!(record.response_body, Some(serde_json::json!({"customId": "A-1"})));
            }
            other => panic!("expected stored response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_reservation_is_taken_over() {
        let store = MemoryStore::new();
        let key = scope("create-item-0002");
        store.reserve_idempotency(&key, "hash-a").await.unwrap();

        {
            let mut state = store.state.write().await;
            let (_, reserved_at) = state.idempotency.get_mut(&key).unwrap();
            *reserved_at = Utc::now() - chrono::Duration::seconds(120);
        }

        assert!(matches!(
            store.reserve_idempotency(&key, "hash-a").await.unwrap(),
            IdempotencyCheck::NotFound
        ));
    }

    #[tokio::test]
    async fn duplicate_custom_id_is_rejected_per_inventory() {
        let store = MemoryStore::new();
        let first = inventory(&store).await;
        let second = inventory(&store).await;

        store.insert_item(new_item(first, "A-1")).await.unwrap();
        let err = store.insert_item(new_item(first, "A-1")).await.unwrap_err();
        assert!(matches!(err, DbError::DuplicateCustomId { .. }));

        store.insert_item(new_item(second, "A-1")).await.unwrap();
        assert_eq!(store.item_count(&first).await, 1);
    }

    #[tokio::test]
    async fn update_custom_id_rechecks_uniqueness() {
        let store = MemoryStore::new();
        let id = inventory(&store).await;
        let a = store.insert_item(new_item(id, "A")).await.unwrap();
        store.insert_item(new_item(id, "B")).await.unwrap();

        let err = store.update_custom_id(&id, &a.id, "B").await.unwrap_err();
        assert!(matches!(err, DbError::DuplicateCustomId { .. }));

        let same = store.update_custom_id(&id, &a.id, "A").await.unwrap();
        assert_eq!(same.custom_id, "A");

        let renamed = store.update_custom_id(&id, &a.id, "C").await.unwrap();
        assert_eq!(renamed.custom_id, "C");
        store.insert_item(new_item(id, "A")).await.unwrap();
    }

    #[tokio::test]
    async fn counter_outage_is_transient() {
        let store = MemoryStore::new();
        let id = inventory(&store).await;
        store.set_counter_outage(true);
        let err = store.advance_sequence(&id).await.unwrap_err();
        assert!(err.is_transient());
        store.set_counter_outage(false);
        assert_eq!(store.advance_sequence(&id).await.unwrap(), SequenceValue::FIRST);
    }
}
