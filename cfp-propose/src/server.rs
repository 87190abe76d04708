//! HTTP server setup and routing
//!
//! Axum router for the author-facing endpoints. Authentication itself is
//! out of scope; handlers resolve the caller through the injected session
//! store.

use cfp_common::session::SessionStore;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use axum::{
    routing::{get, post},
    Router,
};

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub db_pool: SqlitePool,
    pub sessions: Arc<SessionStore>,
}

/// Build the propose service router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Proposal submission and editing
        .route(
            "/proposals",
            post(super::handlers::submit_proposal).get(super::handlers::list_proposals),
        )
        .route("/proposals/:cfp_index", get(super::handlers::get_proposal))
        .route(
            "/proposals/:cfp_index/confirm",
            post(super::handlers::confirm_writer),
        )
        // Tag vocabulary for the submission form
        .route("/tags", get(super::handlers::tags))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
