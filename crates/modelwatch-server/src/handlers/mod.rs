//! HTTP route handlers for the modelwatch server.

pub mod model;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}
