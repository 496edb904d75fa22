use axum::response::Json;
use serde_json::json;

/// Health check endpoint handler.
///
/// # Route
/// - **Method**: GET
/// - **Path**: `/ping`
/// - **Response**: `{"status":"pong","version":"<crate version>"}`
///
/// Used by load balancers and container probes; touches no shared state.
pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "pong", "version": env!("CARGO_PKG_VERSION") }))
}
