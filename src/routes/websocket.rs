use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{arena::SharedArena, dto::ws::DisplayQuery, services::websocket_service};

/// Upgrade the HTTP connection into an operator console WebSocket session.
pub async fn operator_handler(
    State(arena): State<SharedArena>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_operator_socket(arena, socket))
}

/// Upgrade the HTTP connection into a display WebSocket session.
///
/// A returning display passes its assigned id (and optional nickname) as
/// query parameters to reclaim its registration.
pub async fn display_handler(
    State(arena): State<SharedArena>,
    Query(query): Query<DisplayQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_display_socket(arena, socket, query))
}

/// Configure the WebSocket endpoints.
pub fn router() -> Router<SharedArena> {
    Router::<SharedArena>::new()
        .route("/api/arena/websocket", get(operator_handler))
        .route("/api/displays/websocket", get(display_handler))
}
