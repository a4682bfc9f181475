//! Item API endpoints.
//!
//! Creating an item assigns its custom ID: either generated from the
//! inventory's format or taken from the request, and in both cases checked for
//! uniqueness within the inventory.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockroom_id::{InventoryId, ItemId, SequenceValue};
use stockroom_idformat::IdentifierFormat;

use crate::api::authz;
use crate::api::error::ApiError;
use crate::api::idempotency;
use crate::api::request_context::RequestContext;
use crate::arbiter::ArbiterError;
use crate::db::{DbError, IdempotencyScope, ItemRecord};
use crate::identifiers::{CreateError, NewItemRequest, Resolution};
use crate::state::AppState;

use super::{parse_inventory_id, parse_item_id};

const MAX_NAME_LEN: usize = 200;
const MAX_CUSTOM_ID_LEN: usize = 255;

/// Create item routes.
///
/// Items are nested under inventories: /v1/inventories/{inventory_id}/items
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_item))
        .route("/{item_id}", get(get_item).patch(update_item))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub name: String,

    /// Manual custom ID; when absent one is generated from the format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,

    /// Free-form item attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub custom_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: ItemId,
    pub inventory_id: InventoryId,
    pub name: String,
    pub custom_id: String,
    pub sequence_value: SequenceValue,
    pub values: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ItemRecord> for ItemResponse {
    fn from(record: ItemRecord) -> Self {
        Self {
            id: record.id,
            inventory_id: record.inventory_id,
            name: record.name,
            custom_id: record.custom_id,
            sequence_value: record.sequence_value,
            values: record.fields,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// The created item plus the inventory's identifier state afterwards.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemResponse {
    pub item: ItemResponse,
    pub custom_id: String,
    pub id_format: IdentifierFormat,
    pub next_sequence: SequenceValue,
    pub attempts: u32,
}

// =============================================================================
// Handlers
// =============================================================================

fn create_error_to_api(e: CreateError, request_id: &str) -> ApiError {
    let resolution = e.resolution();
    let api = match &e {
        CreateError::InventoryNotFound(id) => {
            return ApiError::not_found("inventory_not_found", format!("Inventory {id} not found"))
                .with_request_id(request_id.to_string());
        }
        CreateError::Duplicate { .. } => ApiError::conflict("duplicate_identifier", e.to_string()),
        CreateError::CounterUnavailable(_) => {
            tracing::error!(error = %e, request_id = %request_id, "Sequence counter unavailable");
            ApiError::service_unavailable(
                "counter_unavailable",
                "Could not assign identifier; contact an administrator",
            )
        }
        CreateError::Storage(_) => {
            tracing::error!(error = %e, request_id = %request_id, "Failed to create item");
            ApiError::internal("internal_error", "Failed to create item")
        }
    };
    api.with_resolution(resolution)
        .with_request_id(request_id.to_string())
}

fn arbiter_error_to_api(e: ArbiterError, request_id: &str) -> ApiError {
    let api = match e {
        ArbiterError::Duplicate { custom_id, .. } => ApiError::conflict(
            "duplicate_identifier",
            format!("Custom ID '{custom_id}' is already taken in this inventory"),
        )
        .with_resolution(Resolution::TryAgain),
        ArbiterError::Storage(DbError::ItemNotFound(id)) => {
            ApiError::not_found("item_not_found", format!("Item {id} not found"))
        }
        ArbiterError::Storage(other) => {
            tracing::error!(error = %other, request_id = %request_id, "Failed to update item");
            ApiError::internal("internal_error", "Failed to update item")
        }
    };
    api.with_request_id(request_id.to_string())
}

fn validate_custom_id(custom_id: &str, request_id: &str) -> Result<(), ApiError> {
    if custom_id.len() > MAX_CUSTOM_ID_LEN {
        return Err(ApiError::bad_request(
            "invalid_custom_id",
            format!("Custom ID cannot exceed {MAX_CUSTOM_ID_LEN} characters"),
        )
        .with_request_id(request_id.to_string()));
    }
    Ok(())
}

/// Create an item, assigning its custom ID.
///
/// With an `Idempotency-Key`, the key is reserved before the counter is
/// touched: a concurrent request with the same key gets
/// `idempotency_request_in_progress`, a later one replays the stored response.
/// A failed creation releases the key.
///
/// POST /v1/inventories/{inventory_id}/items
async fn create_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(inventory_id): Path<String>,
    Json(req): Json<CreateItemRequest>,
) -> Result<Response, ApiError> {
    let request_id = ctx.request_id.clone();
    let idempotency_key = ctx.idempotency_key.clone();
    let actor_id = ctx.actor_id.clone();
    let endpoint_name = "items.create";

    let inventory_id = parse_inventory_id(&inventory_id, &request_id)?;
    let role = authz::require_inventory_member(&state, &inventory_id, &ctx).await?;
    authz::require_inventory_write(role, &request_id)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(
            ApiError::bad_request("invalid_name", "Item name cannot be empty")
                .with_request_id(request_id),
        );
    }

    if name.len() > MAX_NAME_LEN {
        return Err(ApiError::bad_request(
            "invalid_name",
            format!("Item name cannot exceed {MAX_NAME_LEN} characters"),
        )
        .with_request_id(request_id));
    }

    if let Some(custom_id) = &req.custom_id {
        validate_custom_id(custom_id, &request_id)?;
    }

    let values = req.values.clone().unwrap_or_else(|| serde_json::json!({}));
    if !values.is_object() {
        return Err(
            ApiError::bad_request("invalid_values", "Item values must be a JSON object")
                .with_request_id(request_id),
        );
    }

    let request_hash = idempotency_key
        .as_deref()
        .map(|key| {
            idempotency::request_hash(endpoint_name, &req).map(|hash| (key.to_string(), hash))
        })
        .transpose()
        .map_err(|e| e.with_request_id(request_id.clone()))?;

    let scope = |key: &str| IdempotencyScope {
        inventory_id: inventory_id.to_string(),
        actor_id: actor_id.clone(),
        endpoint_name: endpoint_name.to_string(),
        idempotency_key: key.to_string(),
    };

    if let Some((key, hash)) = request_hash.as_ref() {
        if let Some((status, body)) =
            idempotency::reserve(&state, &scope(key), hash, &request_id).await?
        {
            tracing::debug!(request_id = %request_id, "Replaying stored item creation");
            return Ok(
                (status, Json(body.unwrap_or_else(|| serde_json::json!({})))).into_response(),
            );
        }
    }

    let created = match state
        .identifiers()
        .create_item_with_generated_id(
            &inventory_id,
            NewItemRequest {
                name: name.to_string(),
                override_id: req.custom_id.clone(),
                fields: values,
                created_by: actor_id.clone(),
            },
        )
        .await
    {
        Ok(created) => created,
        Err(e) => {
            if let Some((key, _)) = request_hash.as_ref() {
                idempotency::release(&state, &scope(key), &request_id).await;
            }
            return Err(create_error_to_api(e, &request_id));
        }
    };

    let response = CreateItemResponse {
        custom_id: created.item.custom_id.clone(),
        item: ItemResponse::from(created.item),
        id_format: created.settings.id_format,
        next_sequence: created.settings.next_sequence,
        attempts: created.attempts,
    };

    if let Some((key, hash)) = request_hash {
        let body = serde_json::to_value(&response).map_err(|e| {
            tracing::error!(error = %e, request_id = %request_id, "Failed to serialize response");
            ApiError::internal("internal_error", "Failed to create item")
                .with_request_id(request_id.clone())
        })?;

        let _ = idempotency::store(
            &state,
            scope(&key),
            &hash,
            StatusCode::CREATED,
            Some(body),
            &request_id,
        )
        .await;
    }

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// GET /v1/inventories/{inventory_id}/items/{item_id}
async fn get_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((inventory_id, item_id)): Path<(String, String)>,
) -> Result<Json<ItemResponse>, ApiError> {
    let request_id = ctx.request_id.clone();
    let inventory_id = parse_inventory_id(&inventory_id, &request_id)?;
    let item_id = parse_item_id(&item_id, &request_id)?;
    authz::require_inventory_member(&state, &inventory_id, &ctx).await?;

    let record = state
        .db()
        .store()
        .get_item(&inventory_id, &item_id)
        .await
        .map_err(|e| match e {
            DbError::ItemNotFound(_) => {
                ApiError::not_found("item_not_found", format!("Item {item_id} not found"))
                    .with_request_id(request_id.clone())
            }
            other => {
                tracing::error!(error = %other, request_id = %request_id, "Failed to load item");
                ApiError::internal("internal_error", "Failed to load item")
                    .with_request_id(request_id.clone())
            }
        })?;

    Ok(Json(ItemResponse::from(record)))
}

/// Change an item's custom ID; uniqueness is re-checked.
///
/// PATCH /v1/inventories/{inventory_id}/items/{item_id}
async fn update_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((inventory_id, item_id)): Path<(String, String)>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let request_id = ctx.request_id.clone();
    let inventory_id = parse_inventory_id(&inventory_id, &request_id)?;
    let item_id = parse_item_id(&item_id, &request_id)?;
    let role = authz::require_inventory_member(&state, &inventory_id, &ctx).await?;
    authz::require_inventory_write(role, &request_id)?;
    validate_custom_id(&req.custom_id, &request_id)?;

    let record = state
        .identifiers()
        .update_custom_id(&inventory_id, &item_id, &req.custom_id)
        .await
        .map_err(|e| arbiter_error_to_api(e, &request_id))?;

    tracing::info!(
        inventory_id = %inventory_id,
        item_id = %item_id,
        custom_id = %record.custom_id,
        request_id = %request_id,
        "Item custom ID updated"
    );

    Ok(Json(ItemResponse::from(record)))
}
