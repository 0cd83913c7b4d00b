//! Wire-facing payload types for websocket traffic.

pub mod events;
pub mod health;
pub mod ws;
