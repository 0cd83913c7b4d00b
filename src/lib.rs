//! Library crate for fieldhub, exposing modules for the binary and integration tests.

pub mod arena;
pub mod config;
pub mod ds;
pub mod dto;
pub mod error;
pub mod models;
pub mod network;
pub mod notify;
mod partner;
pub mod playoff;
pub mod routes;
pub mod services;
pub mod store;
