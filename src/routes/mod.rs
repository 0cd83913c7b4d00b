use axum::Router;

use crate::arena::SharedArena;

pub mod health;
pub mod websocket;

/// Compose all route trees, wiring in the shared arena handle.
pub fn router(arena: SharedArena) -> Router<()> {
    health::router()
        .merge(websocket::router())
        .with_state(arena)
}
