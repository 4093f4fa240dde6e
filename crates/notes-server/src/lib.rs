//! notes-server: HTTP API server for the notes service
//!
//! This crate provides:
//! - Auth endpoints (register, login, refresh, logout, me)
//! - Cursor-paginated note CRUD with role checks
//! - Health, readiness and Prometheus metrics endpoints
//!
//! # Architecture
//!
//! The server is built on Axum with a middleware stack for:
//! - Request ID generation and tracing spans
//! - CORS, request timeout and body size limit
//! - Security headers
//! - Per-IP rate limiting and request metrics
//! - JSON error responses
//!
//! # Usage
//!
//! ```rust,ignore
//! use notes_server::{AppState, ServerConfig, build_app, middleware::Metrics};
//! use notes_store::MemoryStore;
//!
//! let state = AppState::new(MemoryStore::new(), auth_config, ServerConfig::default(), Metrics::new()?)?;
//! let app = build_app(state);
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

// Re-exports for convenience
pub use config::{ConfigError, CorsOrigins, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

// Re-export dependent crates
pub use notes_auth;
pub use notes_core;
pub use notes_store;

/// How often idle rate limit entries are dropped.
pub const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// How often metric histograms are drained.
pub const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Build the application: routes plus the full middleware stack.
pub fn build_app(state: AppState) -> Router {
    let config = state.config().clone();

    let mut app = routes::build_router(state);
    if config.is_development() {
        app = app.layer(axum::middleware::from_fn(middleware::expose_error_detail));
    }

    middleware::with_security_headers(app, config.hsts)
        .layer(RequestBodyLimitLayer::new(config.body_limit))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(cors_layer(&config.cors_origins))
        .layer(axum::middleware::from_fn(middleware::propagate_request_id))
        .layer(TraceLayer::new_for_http().make_span_with(middleware::make_request_span))
        .layer(middleware::request_id_layer())
}

/// Build CORS layer from configuration.
fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => layer.allow_origin(list.clone()),
    }
}

/// Spawn periodic maintenance: rate limiter pruning and metrics upkeep.
///
/// The handles should be aborted on shutdown.
pub fn spawn_background_tasks(state: &AppState) -> Vec<JoinHandle<()>> {
    let limiter_state = state.clone();
    let prune = tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            limiter_state.rate_limiter().prune();
            tracing::trace!(
                clients = limiter_state.rate_limiter().tracked_clients(),
                "Pruned rate limiter"
            );
        }
    });

    let metrics_state = state.clone();
    let upkeep = tokio::spawn(async move {
        let mut interval = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
        loop {
            interval.tick().await;
            metrics_state.metrics().run_upkeep();
        }
    });

    vec![prune, upkeep]
}
