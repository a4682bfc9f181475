//! Postgres-backed store.
//!
//! The counter advance is a single `UPDATE … RETURNING`, so concurrent callers
//! serialize on the inventory row lock. Custom-ID uniqueness is enforced by the
//! `items_inventory_custom_id_key` unique index; a violation surfaces as
//! SQLSTATE 23505 and is mapped to `DbError::DuplicateCustomId`.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use stockroom_id::{InventoryId, ItemId, SequenceValue};
use stockroom_idformat::{IdentifierFormat, InventoryRole};
use tracing::{debug, info};

use super::error::{is_numeric_out_of_range, is_unique_violation};
use super::{
    DbConfig, DbError, IdSettings, IdempotencyCheck, IdempotencyRecord, IdempotencyScope,
    InventoryRecord, InventoryStore, ItemRecord, NewInventory, NewItem, StoreIdempotencyRecord,
    RESERVATION_TTL,
};

/// SQLSTATE 23503: foreign key violation (item for a missing inventory).
fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect(&config.database_url)
            .await
            .map_err(DbError::Connect)?;

        info!("Database connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations.
    ///
    /// Note: In production, migrations should be run as part of deployment.
    /// This method uses runtime migration loading.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        info!("Running database migrations");

        let candidates = vec![
            std::path::PathBuf::from("./migrations"),
            std::path::PathBuf::from("services/inventory-api/migrations"),
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];
        let mut last_error: Option<sqlx::migrate::MigrateError> = None;

        for dir in &candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    info!(migrations_dir = %dir.display(), "Loaded migrations");
                    migrator.run(&self.pool).await.map_err(DbError::Migration)?;
                    info!("Database migrations complete");
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Err(DbError::MigrationDirNotFound {
            tried,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

// =============================================================================
// Row decoding
// =============================================================================

fn parse_inventory_id(raw: &str) -> Result<InventoryId, DbError> {
    raw.parse()
        .map_err(|e| DbError::Corrupt(format!("inventory_id '{raw}': {e}")))
}

fn parse_sequence(raw: i64, column: &str) -> Result<SequenceValue, DbError> {
    SequenceValue::try_from(raw).map_err(|e| DbError::Corrupt(format!("{column}: {e}")))
}

fn parse_format(raw: serde_json::Value) -> Result<IdentifierFormat, DbError> {
    serde_json::from_value(raw).map_err(|e| DbError::Corrupt(format!("id_format: {e}")))
}

fn settings_from_row(row: &PgRow) -> Result<IdSettings, DbError> {
    Ok(IdSettings {
        id_format: parse_format(row.try_get("id_format").map_err(DbError::Query)?)?,
        next_sequence: parse_sequence(
            row.try_get("next_sequence").map_err(DbError::Query)?,
            "next_sequence",
        )?,
    })
}

fn inventory_from_row(row: &PgRow) -> Result<InventoryRecord, DbError> {
    let id: String = row.try_get("inventory_id").map_err(DbError::Query)?;
    let settings = settings_from_row(row)?;
    Ok(InventoryRecord {
        id: parse_inventory_id(&id)?,
        name: row.try_get("name").map_err(DbError::Query)?,
        owner_email: row.try_get("owner_email").map_err(DbError::Query)?,
        id_format: settings.id_format,
        next_sequence: settings.next_sequence,
        created_at: row.try_get("created_at").map_err(DbError::Query)?,
        updated_at: row.try_get("updated_at").map_err(DbError::Query)?,
    })
}

fn item_from_row(row: &PgRow) -> Result<ItemRecord, DbError> {
    let item_id: String = row.try_get("item_id").map_err(DbError::Query)?;
    let inventory_id: String = row.try_get("inventory_id").map_err(DbError::Query)?;
    Ok(ItemRecord {
        id: item_id
            .parse()
            .map_err(|e| DbError::Corrupt(format!("item_id '{item_id}': {e}")))?,
        inventory_id: parse_inventory_id(&inventory_id)?,
        name: row.try_get("name").map_err(DbError::Query)?,
        custom_id: row.try_get("custom_id").map_err(DbError::Query)?,
        sequence_value: parse_sequence(
            row.try_get("sequence_value").map_err(DbError::Query)?,
            "sequence_value",
        )?,
        fields: row.try_get("fields").map_err(DbError::Query)?,
        created_by: row.try_get("created_by").map_err(DbError::Query)?,
        created_at: row.try_get("created_at").map_err(DbError::Query)?,
        updated_at: row.try_get("updated_at").map_err(DbError::Query)?,
    })
}

const INVENTORY_COLUMNS: &str =
    "inventory_id, name, owner_email, id_format, next_sequence, created_at, updated_at";

const ITEM_COLUMNS: &str = "item_id, inventory_id, name, custom_id, sequence_value, fields, \
     created_by, created_at, updated_at";

#[async_trait]
impl InventoryStore for PgStore {
    async fn create_inventory(&self, new: NewInventory) -> Result<InventoryRecord, DbError> {
        let mut tx = self.pool.begin().await.map_err(DbError::Query)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO inventories (inventory_id, name, owner_email)
            VALUES ($1, $2, $3)
            RETURNING {INVENTORY_COLUMNS}
            "#
        ))
        .bind(new.id.to_string())
        .bind(&new.name)
        .bind(&new.owner_email)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        sqlx::query(
            r#"
            INSERT INTO inventory_members (inventory_id, email, role)
            VALUES ($1, $2, 'owner')
            "#,
        )
        .bind(new.id.to_string())
        .bind(&new.owner_email)
        .execute(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        tx.commit().await.map_err(DbError::Query)?;
        inventory_from_row(&row)
    }

    async fn get_inventory(&self, inventory_id: &InventoryId) -> Result<InventoryRecord, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventories WHERE inventory_id = $1"
        ))
        .bind(inventory_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?
        .ok_or(DbError::InventoryNotFound(*inventory_id))?;

        inventory_from_row(&row)
    }

    async fn put_member(
        &self,
        inventory_id: &InventoryId,
        email: &str,
        role: InventoryRole,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_members (inventory_id, email, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (inventory_id, email)
            DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(inventory_id.to_string())
        .bind(email)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                DbError::InventoryNotFound(*inventory_id)
            } else {
                DbError::Query(e)
            }
        })?;

        Ok(())
    }

    async fn member_role(
        &self,
        inventory_id: &InventoryId,
        email: &str,
    ) -> Result<Option<InventoryRole>, DbError> {
        let role: Option<String> = sqlx::query_scalar(
            r#"
            SELECT role
            FROM inventory_members
            WHERE inventory_id = $1 AND email = $2
            "#,
        )
        .bind(inventory_id.to_string())
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?;

        role.map(|r| {
            InventoryRole::parse(&r)
                .ok_or_else(|| DbError::Corrupt(format!("membership role '{r}'")))
        })
        .transpose()
    }

    async fn id_settings(&self, inventory_id: &InventoryId) -> Result<IdSettings, DbError> {
        let row = sqlx::query(
            "SELECT id_format, next_sequence FROM inventories WHERE inventory_id = $1",
        )
        .bind(inventory_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?
        .ok_or(DbError::InventoryNotFound(*inventory_id))?;

        settings_from_row(&row)
    }

    async fn save_id_format(
        &self,
        inventory_id: &InventoryId,
        format: &IdentifierFormat,
    ) -> Result<IdSettings, DbError> {
        let row = sqlx::query(
            r#"
            UPDATE inventories
            SET id_format = $2, updated_at = now()
            WHERE inventory_id = $1
            RETURNING id_format, next_sequence
            "#,
        )
        .bind(inventory_id.to_string())
        .bind(serde_json::to_value(format)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?
        .ok_or(DbError::InventoryNotFound(*inventory_id))?;

        settings_from_row(&row)
    }

    async fn advance_sequence(
        &self,
        inventory_id: &InventoryId,
    ) -> Result<SequenceValue, DbError> {
        let handed_out: i64 = sqlx::query_scalar(
            r#"
            UPDATE inventories
            SET next_sequence = next_sequence + 1, updated_at = now()
            WHERE inventory_id = $1
            RETURNING next_sequence - 1
            "#,
        )
        .bind(inventory_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_numeric_out_of_range(&e) {
                DbError::SequenceExhausted(*inventory_id)
            } else {
                DbError::Query(e)
            }
        })?
        .ok_or(DbError::InventoryNotFound(*inventory_id))?;

        debug!(inventory_id = %inventory_id, value = handed_out, "Advanced sequence");
        parse_sequence(handed_out, "next_sequence")
    }

    async fn insert_item(&self, item: NewItem) -> Result<ItemRecord, DbError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO items (
                item_id,
                inventory_id,
                name,
                custom_id,
                sequence_value,
                fields,
                created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item.id.to_string())
        .bind(item.inventory_id.to_string())
        .bind(&item.name)
        .bind(&item.custom_id)
        .bind(i64::from(item.sequence_value))
        .bind(&item.fields)
        .bind(&item.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::DuplicateCustomId {
                    inventory_id: item.inventory_id,
                    custom_id: item.custom_id.clone(),
                }
            } else if is_foreign_key_violation(&e) {
                DbError::InventoryNotFound(item.inventory_id)
            } else {
                DbError::Query(e)
            }
        })?;

        item_from_row(&row)
    }

    async fn update_custom_id(
        &self,
        inventory_id: &InventoryId,
        item_id: &ItemId,
        custom_id: &str,
    ) -> Result<ItemRecord, DbError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE items
            SET custom_id = $3, updated_at = now()
            WHERE inventory_id = $1 AND item_id = $2
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(inventory_id.to_string())
        .bind(item_id.to_string())
        .bind(custom_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::DuplicateCustomId {
                    inventory_id: *inventory_id,
                    custom_id: custom_id.to_string(),
                }
            } else {
                DbError::Query(e)
            }
        })?
        .ok_or(DbError::ItemNotFound(*item_id))?;

        item_from_row(&row)
    }

    async fn get_item(
        &self,
        inventory_id: &InventoryId,
        item_id: &ItemId,
    ) -> Result<ItemRecord, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE inventory_id = $1 AND item_id = $2"
        ))
        .bind(inventory_id.to_string())
        .bind(item_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?
        .ok_or(DbError::ItemNotFound(*item_id))?;

        item_from_row(&row)
    }

    async fn reserve_idempotency(
        &self,
        scope: &IdempotencyScope,
        request_hash: &str,
    ) -> Result<IdempotencyCheck, DbError> {
        let reserved = sqlx::query(
            r#"
            INSERT INTO idempotency_records (
                inventory_id,
                actor_id,
                endpoint_name,
                idempotency_key,
                request_hash
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (inventory_id, actor_id, endpoint_name, idempotency_key)
            DO UPDATE SET request_hash = EXCLUDED.request_hash, created_at = now()
            WHERE idempotency_records.response_status_code IS NULL
              AND idempotency_records.created_at < now() - make_interval(secs => $6)
            "#,
        )
        .bind(&scope.inventory_id)
        .bind(&scope.actor_id)
        .bind(&scope.endpoint_name)
        .bind(&scope.idempotency_key)
        .bind(request_hash)
        .bind(RESERVATION_TTL.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?
        .rows_affected();

        if reserved == 1 {
            return Ok(IdempotencyCheck::NotFound);
        }

        let row = sqlx::query(
            r#"
            SELECT
                request_hash,
                response_status_code,
                response_body
            FROM idempotency_records
            WHERE inventory_id = $1
              AND actor_id = $2
              AND endpoint_name = $3
              AND idempotency_key = $4
            "#,
        )
        .bind(&scope.inventory_id)
        .bind(&scope.actor_id)
        .bind(&scope.endpoint_name)
        .bind(&scope.idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let record = row
            .map(|row| -> Result<IdempotencyRecord, sqlx::Error> {
                Ok(IdempotencyRecord {
                    request_hash: row.try_get("request_hash")?,
                    response_status_code: row.try_get("response_status_code")?,
                    response_body: row.try_get("response_body")?,
                })
            })
            .transpose()
            .map_err(DbError::Query)?;

        // The holder released the key between the two statements.
        let Some(record) = record else {
            return Ok(IdempotencyCheck::InProgress);
        };
        Ok(IdempotencyCheck::evaluate(Some(record), request_hash))
    }

    async fn store_idempotency(&self, record: StoreIdempotencyRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_records (
                inventory_id,
                actor_id,
                endpoint_name,
                idempotency_key,
                request_hash,
                response_status_code,
                response_body
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (inventory_id, actor_id, endpoint_name, idempotency_key)
            DO UPDATE SET
                response_status_code = EXCLUDED.response_status_code,
                response_body = EXCLUDED.response_body
            WHERE idempotency_records.response_status_code IS NULL
              AND idempotency_records.request_hash = EXCLUDED.request_hash
            "#,
        )
        .bind(record.scope.inventory_id)
        .bind(record.scope.actor_id)
        .bind(record.scope.endpoint_name)
        .bind(record.scope.idempotency_key)
        .bind(record.request_hash)
        .bind(record.response_status_code)
        .bind(record.response_body)
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(())
    }

    async fn release_idempotency(&self, scope: &IdempotencyScope) -> Result<(), DbError> {
        sqlx::query(
            r#"
            DELETE FROM idempotency_records
            WHERE inventory_id = $1
              AND actor_id = $2
              AND endpoint_name = $3
              AND idempotency_key = $4
              AND response_status_code IS NULL
            "#,
        )
        .bind(&scope.inventory_id)
        .bind(&scope.actor_id)
        .bind(&scope.endpoint_name)
        .bind(&scope.idempotency_key)
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }
}
