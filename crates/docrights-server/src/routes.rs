//! Route definitions.

use crate::handlers;
use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// API v1 routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/protect", post(handlers::protect))
        .route("/api/v1/unprotect", post(handlers::unprotect))
        .route("/api/v1/permissions", post(handlers::add_permissions))
        .route("/api/v1/protect/owner", post(handlers::protect_with_owner))
        .route(
            "/api/v1/protect/subject-owner",
            post(handlers::protect_with_subject_owner),
        )
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/health/live", get(handlers::liveness))
        .route("/api/v1/health/ready", get(handlers::readiness))
        .route("/api/v1/info", get(handlers::info))
        // Legacy routes (compatibility with existing clients)
        .route(
            "/api/FileProtection/GetProtectedFileDetails",
            post(handlers::protect),
        )
        .route(
            "/api/FileProtection/GetUnProtectedFileDetails",
            post(handlers::unprotect),
        )
        .route(
            "/api/FileProtection/AssignAdditionalUserPermissions",
            post(handlers::add_permissions),
        )
        .route(
            "/api/FileProtection/GetProtectedFileDetailsWithOwner",
            post(handlers::protect_with_owner),
        )
        .route(
            "/api/FileProtection/GetProtectedFileDetailsWithOwnerAlternate",
            post(handlers::protect_with_subject_owner),
        )
        .route("/api/HealthCheck/status", get(handlers::status))
}
