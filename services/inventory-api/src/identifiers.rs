//! Identifier engine operations exposed to the HTTP layer.
//!
//! - `validate_and_save_format`: drives a [`FormatEditor`] through a save
//! - `preview_trial`: non-committing rendering for editor feedback
//! - `create_item_with_generated_id`: counter, generator and arbiter, with
//!   bounded regeneration on collisions
//! - `update_custom_id`: item edit with the uniqueness re-check

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use stockroom_id::{InventoryId, ItemId, SequenceValue};
use stockroom_idformat::{
    generate_authoritative, generate_authoritative_with, preview_trial, EditorError,
    FormatEditor, FormatError, IdentifierFormat, InventoryRole, RawFormatElement,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::arbiter::{ArbiterError, UniquenessArbiter};
use crate::db::{Database, DbError, IdSettings, ItemRecord, NewItem};
use crate::sequence::{CounterError, RetryPolicy, SequenceCounter};

/// Upper bound on creation attempts, whatever the configuration says.
pub const MAX_ID_ATTEMPTS_CEILING: u32 = 5;

/// What a user should do about a failed item creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    TryAgain,
    ContactAdministrator,
}

#[derive(Debug, Error)]
pub enum FormatSaveError {
    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("inventory not found: {0}")]
    InventoryNotFound(InventoryId),

    #[error(transparent)]
    Storage(DbError),
}

impl From<DbError> for FormatSaveError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::InventoryNotFound(id) => FormatSaveError::InventoryNotFound(id),
            other => FormatSaveError::Storage(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum CreateError {
    #[error("inventory not found: {0}")]
    InventoryNotFound(InventoryId),

    /// The last candidate was taken; `attempts` counts every try.
    #[error("could not assign identifier: '{custom_id}' is already taken (after {attempts} attempts)")]
    Duplicate { custom_id: String, attempts: u32 },

    #[error("could not assign identifier: sequence counter unavailable")]
    CounterUnavailable(#[source] CounterError),

    #[error(transparent)]
    Storage(DbError),
}

impl CreateError {
    pub fn resolution(&self) -> Resolution {
        match self {
            CreateError::Duplicate { .. } => Resolution::TryAgain,
            CreateError::Storage(e) if e.is_transient() => Resolution::TryAgain,
            CreateError::CounterUnavailable(_)
            | CreateError::InventoryNotFound(_)
            | CreateError::Storage(_) => Resolution::ContactAdministrator,
        }
    }
}

impl From<CounterError> for CreateError {
    fn from(e: CounterError) -> Self {
        match e {
            CounterError::NotFound(id) => CreateError::InventoryNotFound(id),
            CounterError::Storage(e) => CreateError::Storage(e),
            unavailable @ (CounterError::Unavailable { .. } | CounterError::Exhausted(_)) => {
                CreateError::CounterUnavailable(unavailable)
            }
        }
    }
}

/// Input for item creation.
#[derive(Debug, Clone)]
pub struct NewItemRequest {
    pub name: String,
    /// Manual custom ID. Skips generation but not the uniqueness check.
    pub override_id: Option<String>,
    pub fields: serde_json::Value,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct CreatedItem {
    pub item: ItemRecord,
    /// Counter state after the creation, for the client's preview hint.
    pub settings: IdSettings,
    pub attempts: u32,
}

/// Random source behind generated identifiers.
#[derive(Clone, Default)]
enum CandidateRng {
    /// Thread-local CSPRNG, seeded from the operating system.
    #[default]
    Os,
    /// One shared, reproducible stream.
    Seeded(Arc<Mutex<StdRng>>),
}

#[derive(Clone)]
pub struct IdentifierService {
    db: Database,
    counter: SequenceCounter,
    arbiter: UniquenessArbiter,
    max_attempts: u32,
    rng: CandidateRng,
}

impl IdentifierService {
    /// `max_attempts` bounds both counter retries and regeneration, clamped to
    /// `1..=MAX_ID_ATTEMPTS_CEILING`.
    pub fn new(db: Database, max_attempts: u32) -> Self {
        let max_attempts = max_attempts.clamp(1, MAX_ID_ATTEMPTS_CEILING);
        let counter = SequenceCounter::new(
            db.clone(),
            RetryPolicy {
                max_attempts,
                ..Default::default()
            },
        );
        let arbiter = UniquenessArbiter::new(db.clone());
        Self {
            db,
            counter,
            arbiter,
            max_attempts,
            rng: CandidateRng::Os,
        }
    }

    /// Draws random elements from a seeded stream so generated identifiers
    /// are reproducible, e.g. for fixtures. Not for production inventories.
    pub fn with_seeded_rng(mut self, seed: u64) -> Self {
        self.rng = CandidateRng::Seeded(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn id_settings(&self, inventory_id: &InventoryId) -> Result<IdSettings, DbError> {
        self.db.store().id_settings(inventory_id).await
    }

    /// Replaces the inventory's format with `elements` if every element is
    /// valid. Nothing is persisted otherwise.
    pub async fn validate_and_save_format(
        &self,
        inventory_id: &InventoryId,
        role: InventoryRole,
        elements: Vec<RawFormatElement>,
    ) -> Result<IdSettings, FormatSaveError> {
        let current = self.db.store().id_settings(inventory_id).await?;

        let mut editor = FormatEditor::new(current.id_format);
        editor.begin_edit(role)?;
        editor.set_draft(elements)?;
        let format = editor.begin_save()?;

        if format.exceeds_recommended_length() {
            warn!(
                inventory_id = %inventory_id,
                elements = format.len(),
                "Identifier format exceeds the recommended element count"
            );
        }
        if format.exceeds_recommended_sequence_width() {
            warn!(
                inventory_id = %inventory_id,
                "Identifier format pads its sequence wider than recommended"
            );
        }

        match self.db.store().save_id_format(inventory_id, &format).await {
            Ok(settings) => {
                editor.complete_save(Ok(format))?;
                info!(
                    inventory_id = %inventory_id,
                    elements = settings.id_format.len(),
                    "Identifier format saved"
                );
                Ok(settings)
            }
            Err(e) => {
                editor.complete_save(Err(e.to_string()))?;
                Err(e.into())
            }
        }
    }

    /// Illustrative identifier for `elements`. Consumes nothing.
    pub fn preview_trial(
        elements: Vec<RawFormatElement>,
        sequence_hint: Option<SequenceValue>,
    ) -> Result<String, FormatError> {
        let format = IdentifierFormat::validate(elements)?;
        Ok(preview_trial(
            &format,
            sequence_hint.unwrap_or(SequenceValue::FIRST),
        ))
    }

    /// Creates an item with an identifier from the inventory's format, or with
    /// the override if one is given.
    ///
    /// Every attempt consumes one counter value before generating. A collision
    /// is retried with a fresh value while the format can produce a different
    /// identifier and attempts remain; overrides are never regenerated.
    pub async fn create_item_with_generated_id(
        &self,
        inventory_id: &InventoryId,
        request: NewItemRequest,
    ) -> Result<CreatedItem, CreateError> {
        let format = self
            .db
            .store()
            .id_settings(inventory_id)
            .await
            .map_err(|e| match e {
                DbError::InventoryNotFound(id) => CreateError::InventoryNotFound(id),
                other => CreateError::Storage(other),
            })?
            .id_format;
        let regenerable = request.override_id.is_none() && format.is_regenerable();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let sequence_value = self.counter.next_value(inventory_id).await?;
            let custom_id = match &request.override_id {
                Some(id) => id.clone(),
                None => self.generate_candidate(&format, sequence_value).await,
            };

            let candidate = NewItem {
                id: ItemId::new(),
                inventory_id: *inventory_id,
                name: request.name.clone(),
                custom_id,
                sequence_value,
                fields: request.fields.clone(),
                created_by: request.created_by.clone(),
            };

            match self.arbiter.commit(candidate).await {
                Ok(item) => {
                    // The item is committed; from here on nothing may fail.
                    let settings = match self.db.store().id_settings(inventory_id).await {
                        Ok(settings) => settings,
                        Err(e) => {
                            warn!(
                                inventory_id = %inventory_id,
                                item_id = %item.id,
                                error = %e,
                                "Could not re-read identifier settings, using local hint"
                            );
                            IdSettings {
                                id_format: format.clone(),
                                next_sequence: sequence_value.next().unwrap_or(sequence_value),
                            }
                        }
                    };
                    info!(
                        inventory_id = %inventory_id,
                        item_id = %item.id,
                        custom_id = %item.custom_id,
                        sequence_value = %sequence_value,
                        attempt,
                        "Item created"
                    );
                    return Ok(CreatedItem {
                        item,
                        settings,
                        attempts: attempt,
                    });
                }
                Err(ArbiterError::Duplicate { custom_id, .. }) => {
                    if !regenerable || attempt >= self.max_attempts {
                        warn!(
                            inventory_id = %inventory_id,
                            custom_id = %custom_id,
                            attempt,
                            regenerable,
                            "Could not assign a unique identifier"
                        );
                        return Err(CreateError::Duplicate {
                            custom_id,
                            attempts: attempt,
                        });
                    }
                    warn!(
                        inventory_id = %inventory_id,
                        custom_id = %custom_id,
                        attempt,
                        "Identifier collision, regenerating"
                    );
                }
                Err(ArbiterError::Storage(DbError::InventoryNotFound(id))) => {
                    return Err(CreateError::InventoryNotFound(id));
                }
                Err(ArbiterError::Storage(e)) => return Err(CreateError::Storage(e)),
            }
        }
    }

    async fn generate_candidate(
        &self,
        format: &IdentifierFormat,
        sequence_value: SequenceValue,
    ) -> String {
        match &self.rng {
            CandidateRng::Os => generate_authoritative(format, sequence_value).custom_id,
            CandidateRng::Seeded(rng) => {
                let mut rng = rng.lock().await;
                generate_authoritative_with(format, sequence_value, &mut *rng).custom_id
            }
        }
    }

    /// Changes an item's custom ID, re-checking uniqueness in the inventory.
    pub async fn update_custom_id(
        &self,
        inventory_id: &InventoryId,
        item_id: &ItemId,
        custom_id: &str,
    ) -> Result<ItemRecord, ArbiterError> {
        self.arbiter.reassign(inventory_id, item_id, custom_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use rstest::rstest;
    use stockroom_idformat::ElementKind;

    use super::*;
    use crate::db::{
        IdempotencyCheck, IdempotencyScope, InventoryRecord, InventoryStore, MemoryStore,
        NewInventory, StoreIdempotencyRecord,
    };

    /// Memory store whose `id_settings` starts failing once an item exists.
    #[derive(Clone, Default)]
    struct SettingsFailAfterInsert {
        inner: MemoryStore,
        inserted: Arc<AtomicBool>,
    }

    #[async_trait]
    impl InventoryStore for SettingsFailAfterInsert {
        async fn create_inventory(&self, new: NewInventory) -> Result<InventoryRecord, DbError> {
            self.inner.create_inventory(new).await
        }

        async fn get_inventory(
            &self,
            inventory_id: &InventoryId,
        ) -> Result<InventoryRecord, DbError> {
            self.inner.get_inventory(inventory_id).await
        }

        async fn put_member(
            &self,
            inventory_id: &InventoryId,
            email: &str,
            role: InventoryRole,
        ) -> Result<(), DbError> {
            self.inner.put_member(inventory_id, email, role).await
        }

        async fn member_role(
            &self,
            inventory_id: &InventoryId,
            email: &str,
        ) -> Result<Option<InventoryRole>, DbError> {
            self.inner.member_role(inventory_id, email).await
        }

        async fn id_settings(&self, inventory_id: &InventoryId) -> Result<IdSettings, DbError> {
            if self.inserted.load(Ordering::SeqCst) {
                return Err(DbError::Query(sqlx::Error::PoolTimedOut));
            }
            self.inner.id_settings(inventory_id).await
        }

        async fn save_id_format(
            &self,
            inventory_id: &InventoryId,
            format: &IdentifierFormat,
        ) -> Result<IdSettings, DbError> {
            self.inner.save_id_format(inventory_id, format).await
        }

        async fn advance_sequence(
            &self,
            inventory_id: &InventoryId,
        ) -> Result<SequenceValue, DbError> {
            self.inner.advance_sequence(inventory_id).await
        }

        async fn insert_item(&self, item: NewItem) -> Result<ItemRecord, DbError> {
            let record = self.inner.insert_item(item).await?;
            self.inserted.store(true, Ordering::SeqCst);
            Ok(record)
        }

        async fn update_custom_id(
            &self,
            inventory_id: &InventoryId,
            item_id: &ItemId,
            custom_id: &str,
        ) -> Result<ItemRecord, DbError> {
            self.inner
                .update_custom_id(inventory_id, item_id, custom_id)
                .await
        }

        async fn get_item(
            &self,
            inventory_id: &InventoryId,
            item_id: &ItemId,
        ) -> Result<ItemRecord, DbError> {
            self.inner.get_item(inventory_id, item_id).await
        }

        async fn reserve_idempotency(
            &self,
            scope: &IdempotencyScope,
            request_hash: &str,
        ) -> Result<IdempotencyCheck, DbError> {
            self.inner.reserve_idempotency(scope, request_hash).await
        }

        async fn store_idempotency(&self, record: StoreIdempotencyRecord) -> Result<(), DbError> {
            self.inner.store_idempotency(record).await
        }

        async fn release_idempotency(&self, scope: &IdempotencyScope) -> Result<(), DbError> {
            self.inner.release_idempotency(scope).await
        }

        async fn health_check(&self) -> Result<(), DbError> {
            self.inner.health_check().await
        }
    }

    async fn setup(max_attempts: u32) -> (MemoryStore, IdentifierService, InventoryId) {
        let store = MemoryStore::new();
        let id = InventoryId::new();
        store
            .create_inventory(NewInventory {
                id,
                name: "Tools".to_string(),
                owner_email: "owner@example.com".to_string(),
            })
            .await
            .unwrap();
        let service = IdentifierService::new(Database::from_store(store.clone()), max_attempts);
        (store, service, id)
    }

    fn request(override_id: Option<&str>) -> NewItemRequest {
        NewItemRequest {
            name: "Hammer".to_string(),
            override_id: override_id.map(str::to_string),
            fields: serde_json::json!({"weight": "1kg"}),
            created_by: "usr_test".to_string(),
        }
    }

    fn inv_format() -> Vec<RawFormatElement> {
        vec![
            RawFormatElement::literal("INV-"),
            RawFormatElement::sequence(4),
        ]
    }

    async fn preinsert(store: &MemoryStore, inventory_id: InventoryId, custom_id: &str) {
        store
            .insert_item(NewItem {
                id: ItemId::new(),
                inventory_id,
                name: "Existing".to_string(),
                custom_id: custom_id.to_string(),
                sequence_value: SequenceValue::FIRST,
                fields: serde_json::json!({}),
                created_by: "usr_test".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sequence_format_yields_consecutive_ids() {
        let (_store, service, id) = setup(5).await;
        service
            .validate_and_save_format(&id, InventoryRole::Owner, inv_format())
            .await
            .unwrap();

        let first = service
            .create_item_with_generated_id(&id, request(None))
            .await
            .unwrap();
        let second = service
            .create_item_with_generated_id(&id, request(None))
            .await
            .unwrap();

        assert_eq!(first.item.custom_id, "INV-0001");
        assert_eq!(second.item.custom_id, "INV-0002");
        assert_eq!(second.settings.next_sequence.value(), 3);
        assert_eq!(second.item.fields, serde_json::json!({"weight": "1kg"}));
    }

    #[tokio::test]
    async fn saved_format_reads_back_identically() {
        let (_store, service, id) = setup(5).await;
        let elements = vec![
            RawFormatElement::literal("LAB"),
            RawFormatElement::of(ElementKind::Guid),
            RawFormatElement::literal("-"),
            RawFormatElement::of(ElementKind::DateTime),
            RawFormatElement::sequence(3),
        ];
        service
            .validate_and_save_format(&id, InventoryRole::Admin, elements.clone())
            .await
            .unwrap();

        let settings = service.id_settings(&id).await.unwrap();
        assert_eq!(settings.id_format.to_raw(), elements);
    }

    #[tokio::test]
    async fn invalid_format_is_not_persisted() {
        let (_store, service, id) = setup(5).await;
        service
            .validate_and_save_format(&id, InventoryRole::Owner, inv_format())
            .await
            .unwrap();

        let err = service
            .validate_and_save_format(
                &id,
                InventoryRole::Owner,
                vec![RawFormatElement::literal("A"), RawFormatElement::sequence(0)],
            )
            .await
            .unwrap_err();
        match err {
            FormatSaveError::Editor(EditorError::Invalid(e)) => {
                assert_eq!(e.index, 1);
                assert_eq!(e.code(), "invalid_sequence_width");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let settings = service.id_settings(&id).await.unwrap();
        assert_eq!(settings.id_format.to_raw(), inv_format());
    }

    #[rstest]
    #[case(InventoryRole::Write)]
    #[case(InventoryRole::Read)]
    #[tokio::test]
    async fn non_admin_cannot_save_format(#[case] role: InventoryRole) {
        let (_store, service, id) = setup(5).await;
        let err = service
            .validate_and_save_format(&id, role, inv_format())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FormatSaveError::Editor(EditorError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn empty_format_second_item_is_duplicate() {
        let (store, service, id) = setup(5).await;

        let first = service
            .create_item_with_generated_id(&id, request(None))
            .await
            .unwrap();
        assert_eq!(first.item.custom_id, "");

        let err = service
            .create_item_with_generated_id(&id, request(None))
            .await
            .unwrap_err();
        match &err {
            CreateError::Duplicate { custom_id, attempts } => {
                assert_eq!(custom_id, "");
                assert_eq!(*attempts, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.resolution(), Resolution::TryAgain);
        assert_eq!(store.item_count(&id).await, 1);
    }

    #[tokio::test]
    async fn collision_consumes_a_fresh_value_and_regenerates() {
        let (store, service, id) = setup(5).await;
        service
            .validate_and_save_format(&id, InventoryRole::Owner, inv_format())
            .await
            .unwrap();
        preinsert(&store, id, "INV-0001").await;

        let created = service
            .create_item_with_generated_id(&id, request(None))
            .await
            .unwrap();
        assert_eq!(created.item.custom_id, "INV-0002");
        assert_eq!(created.attempts, 2);
        assert_eq!(created.item.sequence_value.value(), 2);
    }

    #[tokio::test]
    async fn regeneration_is_bounded() {
        let (store, service, id) = setup(3).await;
        service
            .validate_and_save_format(&id, InventoryRole::Owner, inv_format())
            .await
            .unwrap();
        for taken in ["INV-0001", "INV-0002", "INV-0003"] {
            preinsert(&store, id, taken).await;
        }

        let err = service
            .create_item_with_generated_id(&id, request(None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CreateError::Duplicate { attempts: 3, .. }
        ));
        assert_eq!(service.id_settings(&id).await.unwrap().next_sequence.value(), 4);
    }

    #[tokio::test]
    async fn override_is_checked_but_never_regenerated() {
        let (_store, service, id) = setup(5).await;
        service
            .validate_and_save_format(&id, InventoryRole::Owner, inv_format())
            .await
            .unwrap();

        let created = service
            .create_item_with_generated_id(&id, request(Some("MANUAL-1")))
            .await
            .unwrap();
        assert_eq!(created.item.custom_id, "MANUAL-1");

        let err = service
            .create_item_with_generated_id(&id, request(Some("MANUAL-1")))
            .await
            .unwrap_err();
        assert!(matches!(err, CreateError::Duplicate { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn counter_advances_without_sequence_element() {
        let (_store, service, id) = setup(5).await;
        service
            .validate_and_save_format(
                &id,
                InventoryRole::Owner,
                vec![RawFormatElement::of(ElementKind::Random32)],
            )
            .await
            .unwrap();

        let created = service
            .create_item_with_generated_id(&id, request(None))
            .await
            .unwrap();
        assert_eq!(created.settings.next_sequence.value(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_random_creations_never_admit_duplicates() {
        let (store, service, id) = setup(5).await;
        service
            .validate_and_save_format(
                &id,
                InventoryRole::Owner,
                vec![RawFormatElement::of(ElementKind::RandomDigits6)],
            )
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.create_item_with_generated_id(&id, request(None)).await
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            let created = handle.await.unwrap().unwrap();
            assert!(ids.insert(created.item.custom_id));
        }
        assert_eq!(ids.len(), 50);
        assert_eq!(store.item_count(&id).await, 50);
    }

    #[tokio::test]
    async fn random_collision_is_regenerated_from_the_same_stream() {
        let (store, service, id) = setup(5).await;
        let service = service.with_seeded_rng(11);
        let elements = vec![RawFormatElement::of(ElementKind::RandomDigits6)];
        service
            .validate_and_save_format(&id, InventoryRole::Owner, elements.clone())
            .await
            .unwrap();

        let format = IdentifierFormat::validate(elements).unwrap();
        let mut expected = StdRng::seed_from_u64(11);
        let first =
            generate_authoritative_with(&format, SequenceValue::FIRST, &mut expected).custom_id;
        let second =
            generate_authoritative_with(&format, SequenceValue::FIRST, &mut expected).custom_id;
        assert_ne!(first, second);
        preinsert(&store, id, &first).await;

        let created = service
            .create_item_with_generated_id(&id, request(None))
            .await
            .unwrap();
        assert_eq!(created.item.custom_id, second);
        assert_eq!(created.attempts, 2);
        assert_eq!(created.settings.next_sequence.value(), 3);
    }

    #[tokio::test]
    async fn settings_read_failure_after_commit_still_reports_the_item() {
        let store = SettingsFailAfterInsert::default();
        let id = InventoryId::new();
        store
            .create_inventory(NewInventory {
                id,
                name: "Tools".to_string(),
                owner_email: "owner@example.com".to_string(),
            })
            .await
            .unwrap();
        let service = IdentifierService::new(Database::from_store(store.clone()), 5);
        service
            .validate_and_save_format(&id, InventoryRole::Owner, inv_format())
            .await
            .unwrap();

        let created = service
            .create_item_with_generated_id(&id, request(None))
            .await
            .unwrap();
        assert_eq!(created.item.custom_id, "INV-0001");
        assert_eq!(created.settings.id_format.to_raw(), inv_format());
        assert_eq!(created.settings.next_sequence.value(), 2);
        assert_eq!(store.inner.item_count(&id).await, 1);
        assert!(store.id_settings(&id).await.is_err());
    }

    #[tokio::test]
    async fn counter_outage_asks_for_an_administrator() {
        let (store, service, id) = setup(2).await;
        store.set_counter_outage(true);

        let err = service
            .create_item_with_generated_id(&id, request(None))
            .await
            .unwrap_err();
        assert!(matches!(err, CreateError::CounterUnavailable(_)));
        assert_eq!(err.resolution(), Resolution::ContactAdministrator);
        assert_eq!(store.item_count(&id).await, 0);
    }

    #[tokio::test]
    async fn missing_inventory() {
        let (_store, service, _id) = setup(5).await;
        let err = service
            .create_item_with_generated_id(&InventoryId::new(), request(None))
            .await
            .unwrap_err();
        assert!(matches!(err, CreateError::InventoryNotFound(_)));
    }

    #[test]
    fn preview_uses_hint_and_validates() {
        let preview = IdentifierService::preview_trial(inv_format(), SequenceValue::new(42)).unwrap();
        assert_eq!(preview, "INV-0042");

        let err = IdentifierService::preview_trial(
            vec![RawFormatElement::of(ElementKind::Literal)],
            None,
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_literal");
    }

    #[test]
    fn attempts_are_clamped() {
        let service = IdentifierService::new(Database::in_memory(), 50);
        assert_eq!(service.max_attempts(), MAX_ID_ATTEMPTS_CEILING);
        let service = IdentifierService::new(Database::in_memory(), 0);
        assert_eq!(service.max_attempts(), 1);
    }
}
