//! Identifier format endpoints.
//!
//! Saving goes through the format editor, so a rejected draft never touches
//! the stored format. Previews render locally and consume nothing.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use stockroom_id::SequenceValue;
use stockroom_idformat::{EditorError, GenerationMode, RawFormatElement};

use crate::api::authz;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::db::{DbError, IdSettings};
use crate::identifiers::{FormatSaveError, IdentifierService};
use crate::state::AppState;

use super::parse_inventory_id;

/// Create id-format routes.
///
/// Nested under inventories: /v1/inventories/{inventory_id}/id-format
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(get_id_format).put(save_id_format))
}

/// Preview is not tied to an inventory: /v1/id-format/preview
pub fn preview_routes() -> Router<AppState> {
    Router::new().route("/id-format/preview", post(preview))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SaveIdFormatRequest {
    pub format: Vec<RawFormatElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub format: Vec<RawFormatElement>,
    /// Advisory value from the last `{ idFormat, nextSequence }` the client saw.
    #[serde(default)]
    pub next_sequence: Option<SequenceValue>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub preview: String,
    pub mode: GenerationMode,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /v1/inventories/{inventory_id}/id-format
async fn get_id_format(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(inventory_id): Path<String>,
) -> Result<Json<IdSettings>, ApiError> {
    let request_id = ctx.request_id.clone();
    let inventory_id = parse_inventory_id(&inventory_id, &request_id)?;
    authz::require_inventory_member(&state, &inventory_id, &ctx).await?;

    let settings = state
        .identifiers()
        .id_settings(&inventory_id)
        .await
        .map_err(|e| match e {
            DbError::InventoryNotFound(_) => ApiError::not_found(
                "inventory_not_found",
                format!("Inventory {inventory_id} not found"),
            )
            .with_request_id(request_id.clone()),
            other => {
                tracing::error!(error = %other, request_id = %request_id, "Failed to load id format");
                ApiError::internal("internal_error", "Failed to load identifier format")
                    .with_request_id(request_id.clone())
            }
        })?;

    Ok(Json(settings))
}

/// Replace the inventory's identifier format. Owner or admin only.
///
/// PUT /v1/inventories/{inventory_id}/id-format
async fn save_id_format(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(inventory_id): Path<String>,
    Json(req): Json<SaveIdFormatRequest>,
) -> Result<Json<IdSettings>, ApiError> {
    let request_id = ctx.request_id.clone();
    let inventory_id = parse_inventory_id(&inventory_id, &request_id)?;
    let role = authz::require_inventory_member(&state, &inventory_id, &ctx).await?;

    let settings = state
        .identifiers()
        .validate_and_save_format(&inventory_id, role, req.format)
        .await
        .map_err(|e| {
            let api = match e {
                FormatSaveError::Editor(EditorError::Forbidden { .. }) => {
                    ApiError::forbidden("forbidden", "Admin role required for this operation")
                }
                FormatSaveError::Editor(EditorError::Invalid(format_error)) => {
                    ApiError::invalid_format(&format_error)
                }
                FormatSaveError::InventoryNotFound(_) => ApiError::not_found(
                    "inventory_not_found",
                    format!("Inventory {inventory_id} not found"),
                ),
                other => {
                    tracing::error!(error = %other, request_id = %request_id, "Failed to save id format");
                    ApiError::internal("internal_error", "Failed to save identifier format")
                }
            };
            api.with_request_id(request_id.clone())
        })?;

    tracing::info!(
        inventory_id = %inventory_id,
        request_id = %request_id,
        actor_id = %ctx.actor_id,
        "Identifier format updated"
    );

    Ok(Json(settings))
}

/// Render a draft format without saving it.
///
/// POST /v1/id-format/preview
async fn preview(
    ctx: RequestContext,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    authz::require_authenticated(&ctx)?;

    let preview = IdentifierService::preview_trial(req.format, req.next_sequence)
        .map_err(|e| ApiError::invalid_format(&e).with_request_id(ctx.request_id.clone()))?;

    Ok(Json(PreviewResponse {
        preview,
        mode: GenerationMode::Trial,
    }))
}
