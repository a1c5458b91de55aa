//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: engine wiring and catalog seeding
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Extension, Router};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

const MAX_BODY_BYTES: usize = 256 * 1024;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/v1", routes::router().layer(Extension(services)))
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(MAX_BODY_BYTES)))
}
