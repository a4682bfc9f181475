//! HTTP API handlers and routing.

mod authz;
pub mod error;
mod health;
mod idempotency;
mod request_context;
mod v1;

use axum::{
    http::{header, HeaderName, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the main API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("idempotency-key"),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_origin(Any);

    Router::new()
        // Health endpoints (no auth required)
        .merge(health::routes())
        // API v1 routes
        .nest("/v1", v1::routes())
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Application state
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::db::Database;

    fn router() -> Router {
        create_router(AppState::new(Database::in_memory(), 5))
    }

    #[tokio::test]
    async fn health_routes_are_mounted_at_root() {
        for path in ["/healthz", "/readyz", "/livez"] {
            let response = router()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn malformed_inventory_id_is_bad_request() {
        let response = router()
            .oneshot(
                Request::get("/v1/inventories/not-an-id/id-format")
                    .header(header::AUTHORIZATION, "Bearer user:a@example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_inventory_is_not_found() {
        let response = router()
            .oneshot(
                Request::get(format!(
                    "/v1/inventories/{}/id-format",
                    stockroom_id::InventoryId::new()
                ))
                .header(header::AUTHORIZATION, "Bearer user:a@example.com")
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
