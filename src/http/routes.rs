//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::room::RoomSummary;
use crate::game::MapSize;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rooms", get(list_rooms_handler).post(create_room_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.client_origin))
        .with_state(state)
}

/// CORS for a comma-separated origin list; `*` allows any origin
fn cors_layer(client_origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return base.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    base.allow_origin(allowed_origins).allow_credentials(true)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_rooms: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_rooms: state.rooms.active_rooms(),
        active_players: state.rooms.total_players(),
    })
}

// ============================================================================
// Room endpoints
// ============================================================================

async fn list_rooms_handler(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.rooms.summaries())
}

#[derive(Debug, Default, Deserialize)]
struct CreateRoomRequest {
    #[serde(default)]
    map_size: Option<MapSize>,
}

#[derive(Serialize)]
struct CreateRoomResponse {
    id: Uuid,
    map_size: MapSize,
    ws_path: String,
}

async fn create_room_handler(
    State(state): State<AppState>,
    body: Option<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), AppError> {
    if state.room_create_limiter.check().is_err() {
        warn!("Room creation rate limited");
        return Err(AppError::TooManyRequests);
    }

    let req = body.map(|Json(req)| req).unwrap_or_default();
    let map_size = req.map_size.unwrap_or(state.config.default_map_size);

    let handle = state
        .rooms
        .create(map_size)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(room_id = %handle.id, %map_size, "Room created");

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            id: handle.id,
            map_size,
            ws_path: format!("/ws?room={}", handle.id),
        }),
    ))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string())
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
