//! Room creation and discovery.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;

use home_game::RoomOptions;

use super::{AppState, bearer_claims};
use crate::metrics;

/// `POST /api/rooms` — create a room with the caller as host.
pub async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(options): Json<RoomOptions>,
) -> impl IntoResponse {
    let claims = match bearer_claims(&state, &headers) {
        Ok(claims) => claims,
        Err(status) => {
            metrics::http_requests_total("POST", "/api/rooms", status.as_u16());
            return (status, Json(json!({ "error": "unauthorized" }))).into_response();
        }
    };

    match state.registry.create(options, claims.sub.clone()).await {
        Ok(info) => {
            tracing::info!(room = %info.id, host = %claims.sub, "room created");
            metrics::rooms_created_total();
            metrics::http_requests_total("POST", "/api/rooms", 201);
            (StatusCode::CREATED, Json(info)).into_response()
        }
        Err(err) => {
            metrics::http_requests_total("POST", "/api/rooms", 400);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

/// `GET /api/rooms` — list open public rooms.
pub async fn list_rooms(State(state): State<AppState>) -> impl IntoResponse {
    let rooms = state.registry.list_public().await;
    metrics::http_requests_total("GET", "/api/rooms", 200);
    Json(rooms)
}
