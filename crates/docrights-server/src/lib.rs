//! Docrights Server - HTTP transport for the protection service
//!
//! A thin layer over [`ProtectionService`]: it checks that required fields
//! are present, hands the request to the core and shapes the response.
//!
//! # Endpoints
//!
//! - `POST /api/v1/protect` - Protect (JSON, base64 content)
//! - `POST /api/v1/unprotect` - Remove label and protection (JSON)
//! - `POST /api/v1/permissions` - Add permissions, keeping existing grants (JSON)
//! - `POST /api/v1/protect/owner` - Protect with an explicit owner (multipart)
//! - `POST /api/v1/protect/subject-owner` - Protect with the first subject as owner (multipart)
//! - `GET /api/v1/health` - Full health report
//! - `GET /api/v1/health/live` - Liveness
//! - `GET /api/v1/health/ready` - Readiness
//! - `GET /api/v1/info` - Server info

pub mod handlers;
pub mod routes;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use docrights_auth::{
    AuthResult, ClientCredentialsProvider, StaticTokenProvider, TokenProvider,
};
use docrights_service::engine::{AuthDelegate, EngineBootstrap, EnvelopeEngine, LabelInfo};
use docrights_service::{
    GraphMailNotifier, HealthChecker, NotificationTrigger, ProtectionService, ServiceConfig,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Largest accepted request body.
pub const MAX_REQUEST_BYTES: usize = 100_000_000;

/// Shared application state
pub struct AppState {
    pub service: ProtectionService,
    pub health: HealthChecker,
}

impl AppState {
    pub fn new(service: ProtectionService) -> Self {
        let health = service.health_checker();
        Self { service, health }
    }
}

/// Build the router with CORS, tracing and the body limit applied.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire the service from configuration.
///
/// Complete app registration credentials select the client-credentials
/// token provider; otherwise a static development token is used.
pub fn service_from_config(config: ServiceConfig) -> AuthResult<ProtectionService> {
    let tokens: Arc<dyn TokenProvider> = match config.identity.validate() {
        Ok(()) => {
            info!(tenant = %config.identity.tenant_id, "Using client-credentials token provider");
            Arc::new(ClientCredentialsProvider::new(config.identity.clone())?)
        }
        Err(e) => {
            warn!(error = %e, "App registration incomplete, using a static development token");
            Arc::new(StaticTokenProvider::new("development"))
        }
    };

    let label = LabelInfo::new(
        format!("{}:{}", config.engine.engine_id, config.engine.label_to_apply),
        config.engine.label_to_apply.clone(),
    );
    let engine = EnvelopeEngine::new(config.engine.cache_path.clone(), vec![label])
        .with_auth(AuthDelegate::new(tokens.clone()), config.engine.resource.clone());

    let notifications = if config.notification.enabled {
        let notifier = GraphMailNotifier::new(
            &config.notification,
            config.mail_sender(),
            tokens,
            config.mail_timeout(),
        );
        NotificationTrigger::new(Arc::new(notifier), config.notification.body_template.clone())
    } else {
        NotificationTrigger::disabled()
    };

    Ok(ProtectionService::new(
        config,
        Arc::new(EngineBootstrap::new(Arc::new(engine))),
        notifications,
    ))
}
