//! Idempotency helpers for retry-safe write endpoints.

use axum::http::StatusCode;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::api::error::ApiError;
use crate::db::{IdempotencyCheck, IdempotencyScope, StoreIdempotencyRecord};
use crate::identifiers::Resolution;
use crate::state::AppState;

fn canonicalize_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();

            let mut ordered = serde_json::Map::new();
            for key in keys {
                if let Some(mut value) = map.remove(&key) {
                    canonicalize_json(&mut value);
                    ordered.insert(key, value);
                }
            }

            *map = ordered;
        }
        serde_json::Value::Array(items) => {
            for item in items {
                canonicalize_json(item);
            }
        }
        _ => {}
    }
}

pub fn request_hash(endpoint_name: &str, request: &impl Serialize) -> Result<String, ApiError> {
    let mut value = serde_json::to_value(request).map_err(|e| {
        ApiError::internal(
            "internal_error",
            format!("Failed to serialize request body: {}", e),
        )
    })?;

    canonicalize_json(&mut value);
    let canonical = serde_json::to_string(&value).map_err(|e| {
        ApiError::internal(
            "internal_error",
            format!("Failed to serialize canonical request body: {}", e),
        )
    })?;

    let mut hasher = Sha256::new();
    hasher.update(endpoint_name.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Reserves the key for this request, or returns the stored response for a
/// replayed one.
pub async fn reserve(
    state: &AppState,
    scope: &IdempotencyScope,
    request_hash: &str,
    request_id: &str,
) -> Result<Option<(StatusCode, Option<serde_json::Value>)>, ApiError> {
    let check = state
        .db()
        .store()
        .reserve_idempotency(scope, request_hash)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                request_id = %request_id,
                "Failed to reserve idempotency key"
            );
            ApiError::internal("internal_error", "Failed to process request")
                .with_request_id(request_id.to_string())
        })?;

    match check {
        IdempotencyCheck::NotFound => Ok(None),
        IdempotencyCheck::Found(record) => {
            let status = record
                .response_status_code
                .and_then(|code| u16::try_from(code).ok())
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::OK);
            Ok(Some((status, record.response_body)))
        }
        IdempotencyCheck::InProgress => Err(ApiError::conflict(
            "idempotency_request_in_progress",
            "A request with this Idempotency-Key is still being processed",
        )
        .with_resolution(Resolution::TryAgain)
        .with_request_id(request_id.to_string())),
        IdempotencyCheck::Conflict => Err(ApiError::conflict(
            "idempotency_key_conflict",
            "Idempotency-Key was already used with a different request",
        )
        .with_request_id(request_id.to_string())),
    }
}

/// Gives the key back after a failed request. Failures are logged; the
/// reservation then lapses on its own.
pub async fn release(state: &AppState, scope: &IdempotencyScope, request_id: &str) {
    if let Err(e) = state.db().store().release_idempotency(scope).await {
        tracing::warn!(
            error = %e,
            request_id = %request_id,
            "Failed to release idempotency key"
        );
    }
}

pub async fn store(
    state: &AppState,
    scope: IdempotencyScope,
    request_hash: &str,
    status: StatusCode,
    body: Option<serde_json::Value>,
    request_id: &str,
) -> Result<(), ApiError> {
    state
        .db()
        .store()
        .store_idempotency(StoreIdempotencyRecord {
            scope,
            request_hash: request_hash.to_string(),
            response_status_code: i32::from(status.as_u16()),
            response_body: body,
        })
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                request_id = %request_id,
                "Failed to store idempotency record"
            );
            ApiError::internal("internal_error", "Failed to process request")
                .with_request_id(request_id.to_string())
        })
}
