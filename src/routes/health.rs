use axum::{Json, Router, routing::get};

use crate::arena::SharedArena;
use crate::dto::health::HealthResponse;

/// Return the current health status of the field server.
pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Configure the health routes subtree.
pub fn router() -> Router<SharedArena> {
    Router::<SharedArena>::new().route("/healthcheck", get(healthcheck))
}
