//! Authorization helpers (v1).
//!
//! Access is scoped per inventory through the membership table.

use stockroom_id::InventoryId;
use stockroom_idformat::InventoryRole;

use crate::api::error::ApiError;
use crate::api::request_context::{ActorType, RequestContext};
use crate::db::DbError;
use crate::state::AppState;

pub fn require_authenticated(ctx: &RequestContext) -> Result<(), ApiError> {
    if ctx.actor_type == ActorType::Anonymous {
        return Err(ApiError::unauthorized(
            "unauthorized",
            "Missing or invalid Authorization token",
        )
        .with_request_id(ctx.request_id.clone()));
    }
    Ok(())
}

/// The caller's email, required for anything scoped to an inventory.
pub fn require_email(ctx: &RequestContext) -> Result<&str, ApiError> {
    require_authenticated(ctx)?;
    ctx.actor_email.as_deref().ok_or_else(|| {
        ApiError::unauthorized(
            "unauthorized",
            "Token subject email is required for inventory-scoped APIs (use Bearer user:<email> in dev)",
        )
        .with_request_id(ctx.request_id.clone())
    })
}

/// Resolves the caller's role. Unknown inventories and non-members both get
/// 404 so inventory ids cannot be probed.
pub async fn require_inventory_member(
    state: &AppState,
    inventory_id: &InventoryId,
    ctx: &RequestContext,
) -> Result<InventoryRole, ApiError> {
    let email = require_email(ctx)?;
    let request_id = &ctx.request_id;

    let role = state
        .db()
        .store()
        .member_role(inventory_id, email)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                request_id = %request_id,
                inventory_id = %inventory_id,
                "Failed to load inventory membership"
            );
            match e {
                DbError::InventoryNotFound(_) => not_found(inventory_id, request_id),
                _ => ApiError::internal("internal_error", "Failed to authorize request")
                    .with_request_id(request_id.clone()),
            }
        })?;

    role.ok_or_else(|| not_found(inventory_id, request_id))
}

fn not_found(inventory_id: &InventoryId, request_id: &str) -> ApiError {
    ApiError::not_found(
        "inventory_not_found",
        format!("Inventory {inventory_id} not found"),
    )
    .with_request_id(request_id.to_string())
}

pub fn require_inventory_write(role: InventoryRole, request_id: &str) -> Result<(), ApiError> {
    if role.can_create_items() {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "forbidden",
            "Insufficient permissions for write operation",
        )
        .with_request_id(request_id.to_string()))
    }
}

pub fn require_inventory_admin(role: InventoryRole, request_id: &str) -> Result<(), ApiError> {
    if role.can_edit_format() {
        Ok(())
    } else {
        Err(
            ApiError::forbidden("forbidden", "Admin role required for this operation")
                .with_request_id(request_id.to_string()),
        )
    }
}
