//! HTTP server setup and routing
//!
//! Axum router for the reviewer-facing endpoints. Authentication itself is
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

/// Build the review service router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Assignment and scoring
        .route("/assignments/next", get(super::handlers::next_assignment))
        .route("/cfp/:cfp_index", get(super::handlers::get_cfp))
        .route("/scores", post(super::handlers::submit_score))
        .route("/refusals/:cfp_index", post(super::handlers::refuse))
        // Completion views
        .route("/done", get(super::handlers::done))
        .route("/overview", get(super::handlers::overview))
        // Committee reports (admin only)
        .route("/tracks/:track/report", get(super::handlers::track_report))
        .route("/stats", get(super::handlers::global_stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
