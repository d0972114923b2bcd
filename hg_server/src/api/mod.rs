//! HTTP and WebSocket API.
//!
//! The HTTP surface is deliberately small: anonymous token issuance, room
//! creation and discovery, and a health probe. Everything real-time flows
//! over the WebSocket at `/ws`, which authenticates with the same token
//! and speaks the `home_game` event protocol.

pub mod auth;
pub mod rooms;
pub mod websocket;

use axum::{
    Router,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use home_game::RoomRegistry;

use auth::{AuthService, Claims};

/// Shared application state. Cloned per request; everything inside is an
/// `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub registry: Arc<RoomRegistry>,
}

/// Pull and verify the bearer token from an `Authorization` header.
pub fn bearer_claims(state: &AppState, headers: &HeaderMap) -> Result<Claims, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;
    state
        .auth
        .verify(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/anonymous", post(auth::anonymous))
        .route("/api/rooms", post(rooms::create_room).get(rooms::list_rooms))
        .route("/ws", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
