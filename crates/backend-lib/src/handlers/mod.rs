// ============================
// authority-backend/src/handlers/mod.rs
// ============================
//! HTTP handlers.
pub mod admin;
pub mod auth;
pub mod users;

use axum::Json;
use serde_json::{json, Value};

/// Liveness check
pub async fn ping() -> Json<Value> {
    Json(json!({ "msg": "pong" }))
}
