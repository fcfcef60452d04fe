use axum::response::Json;
use serde_json::{json, Value};

/// Liveness probe. Deliberately does not touch the store or either
/// client -- a slow downstream dependency should not flip this
/// unhealthy and trigger a restart loop.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "capsync",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
