//! Inventory API endpoints.
//!
//! An inventory owns one identifier format and one sequence counter. Its
//! creator becomes the owner; other members are granted roles explicitly.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockroom_id::{InventoryId, SequenceValue};
use stockroom_idformat::{IdentifierFormat, InventoryRole};

use crate::api::authz;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::db::{DbError, InventoryRecord, NewInventory};
use crate::state::AppState;

use super::parse_inventory_id;

/// Create inventory routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_inventory))
        .route("/{inventory_id}", get(get_inventory))
        .route("/{inventory_id}/members/{email}", put(put_member))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateInventoryRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub id: InventoryId,
    pub name: String,
    pub owner_email: String,
    pub id_format: IdentifierFormat,
    pub next_sequence: SequenceValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InventoryRecord> for InventoryResponse {
    fn from(record: InventoryRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            owner_email: record.owner_email,
            id_format: record.id_format,
            next_sequence: record.next_sequence,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PutMemberRequest {
    pub role: InventoryRole,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub inventory_id: InventoryId,
    pub email: String,
    pub role: InventoryRole,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a new inventory with an empty format and the counter at 1.
///
/// POST /v1/inventories
async fn create_inventory(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateInventoryRequest>,
) -> Result<Response, ApiError> {
    let request_id = ctx.request_id.clone();
    let owner_email = authz::require_email(&ctx)?.to_string();

    let name = req.name.trim();
    if name.is_empty() {
        return Err(
            ApiError::bad_request("invalid_name", "Inventory name cannot be empty")
                .with_request_id(request_id),
        );
    }

    if name.len() > 200 {
        return Err(ApiError::bad_request(
            "invalid_name",
            "Inventory name cannot exceed 200 characters",
        )
        .with_request_id(request_id));
    }

    let record = state
        .db()
        .store()
        .create_inventory(NewInventory {
            id: InventoryId::new(),
            name: name.to_string(),
            owner_email,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, request_id = %request_id, "Failed to create inventory");
            ApiError::internal("internal_error", "Failed to create inventory")
                .with_request_id(request_id.clone())
        })?;

    tracing::info!(
        inventory_id = %record.id,
        request_id = %request_id,
        "Inventory created"
    );

    Ok((StatusCode::CREATED, Json(InventoryResponse::from(record))).into_response())
}

/// GET /v1/inventories/{inventory_id}
async fn get_inventory(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(inventory_id): Path<String>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let request_id = ctx.request_id.clone();
    let inventory_id = parse_inventory_id(&inventory_id, &request_id)?;
    authz::require_inventory_member(&state, &inventory_id, &ctx).await?;

    let record = state
        .db()
        .store()
        .get_inventory(&inventory_id)
        .await
        .map_err(|e| match e {
            DbError::InventoryNotFound(_) => ApiError::not_found(
                "inventory_not_found",
                format!("Inventory {inventory_id} not found"),
            )
            .with_request_id(request_id.clone()),
            other => {
                tracing::error!(error = %other, request_id = %request_id, "Failed to load inventory");
                ApiError::internal("internal_error", "Failed to load inventory")
                    .with_request_id(request_id.clone())
            }
        })?;

    Ok(Json(InventoryResponse::from(record)))
}

/// Grant or change a member's role.
///
/// PUT /v1/inventories/{inventory_id}/members/{email}
async fn put_member(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((inventory_id, email)): Path<(String, String)>,
    Json(req): Json<PutMemberRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    let request_id = ctx.request_id.clone();
    let inventory_id = parse_inventory_id(&inventory_id, &request_id)?;

    let role = authz::require_inventory_member(&state, &inventory_id, &ctx).await?;
    authz::require_inventory_admin(role, &request_id)?;

    // Only owners hand out ownership.
    if req.role == InventoryRole::Owner && role != InventoryRole::Owner {
        return Err(
            ApiError::forbidden("forbidden", "Only an owner can grant the owner role")
                .with_request_id(request_id),
        );
    }

    let email = email.trim().to_lowercase();
    if email.is_empty() || email.len() > 320 || !email.contains('@') {
        return Err(
            ApiError::bad_request("invalid_email", "Member email is not valid")
                .with_request_id(request_id),
        );
    }

    state
        .db()
        .store()
        .put_member(&inventory_id, &email, req.role)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, request_id = %request_id, "Failed to update membership");
            ApiError::internal("internal_error", "Failed to update membership")
                .with_request_id(request_id.clone())
        })?;

    tracing::info!(
        inventory_id = %inventory_id,
        request_id = %request_id,
        role = %req.role,
        "Inventory member updated"
    );

    Ok(Json(MemberResponse {
        inventory_id,
        email,
        role: req.role,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_member_request_deserialization() {
        let req: PutMemberRequest = serde_json::from_str(r#"{"role": "write"}"#).unwrap();
        assert_eq!(req.role, InventoryRole::Write);
        assert!(serde_json::from_str::<PutMemberRequest>(r#"{"role": "root"}"#).is_err());
    }

    #[test]
    fn test_inventory_response_serialization() {
        let now = Utc::now();
        let response = InventoryResponse {
            id: InventoryId::new(),
            name: "Lab".to_string(),
            owner_email: "owner@example.com".to_string(),
            id_format: IdentifierFormat::empty(),
            next_sequence: SequenceValue::FIRST,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["id"].as_str().unwrap().starts_with("inv_"));
        assert_eq!(json["idFormat"], serde_json::json!([]));
        assert_eq!(json["nextSequence"], 1);
        assert_eq!(json["ownerEmail"], "owner@example.com");
    }
}
