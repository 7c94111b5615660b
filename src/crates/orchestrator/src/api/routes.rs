//! API route definitions
//!
//! Defines all API routes and their associated handler functions.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::api::middleware::{cors_layer, logging_layer};
use crate::controller::JobController;
use crate::db::DatabaseConnection;

/// Shared application state. `db` backs the health check; every job
/// mutation goes through `controller` so the lease/state-machine
/// invariants live in one place.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub controller: Arc<JobController>,
}

/// Build the complete API router
pub fn create_router(db: DatabaseConnection, controller: Arc<JobController>) -> Router {
    let app_state = AppState { db, controller };

    Router::new()
        // Health check endpoints
        .route("/health", get(handlers::health))
        .route("/api/v1/system/health", get(handlers::health_detailed))
        // Job endpoints
        .route("/api/v1/jobs", post(handlers::create_job))
        .route("/api/v1/jobs/:id", get(handlers::get_job))
        .route("/api/v1/jobs/:id/tick", post(handlers::tick_job))
        .route("/api/v1/jobs/:id/cancel", post(handlers::cancel_job))
        .route("/api/v1/jobs/:id/manuscript", get(handlers::get_manuscript))
        .route("/api/v1/jobs/:id/checkpoints", get(handlers::list_checkpoints))
        .layer(logging_layer())
        .layer(cors_layer())
        .with_state(app_state)
}
