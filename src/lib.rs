//! Library crate for groupcast-back, exposing modules for binaries and integration tests.

/// Client-side optimistic editor and autosave driver.
pub mod client;
/// Application configuration loading.
pub mod config;
/// Storage entities and backends.
pub mod dao;
/// Wire types shared by routes, services and the client.
pub mod dto;
/// Error types and HTTP error mapping.
pub mod error;
/// HTTP route handlers.
pub mod routes;
/// Business logic services.
pub mod services;
/// Shared application state.
pub mod state;
