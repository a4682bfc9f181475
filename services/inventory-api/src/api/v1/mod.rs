//! API v1 routes.

mod id_format;
mod inventories;
mod items;

use axum::Router;
use stockroom_id::{InventoryId, ItemId};

use crate::api::error::ApiError;
use crate::state::AppState;

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/inventories", inventories::routes())
        // Format and items are nested under inventories: /v1/inventories/{inventory_id}/...
        .nest("/inventories/{inventory_id}/id-format", id_format::routes())
        .nest("/inventories/{inventory_id}/items", items::routes())
        .merge(id_format::preview_routes())
}

fn parse_inventory_id(raw: &str, request_id: &str) -> Result<InventoryId, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::bad_request("invalid_inventory_id", "Invalid inventory ID format")
            .with_request_id(request_id.to_string())
    })
}

fn parse_item_id(raw: &str, request_id: &str) -> Result<ItemId, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::bad_request("invalid_item_id", "Invalid item ID format")
            .with_request_id(request_id.to_string())
    })
}
