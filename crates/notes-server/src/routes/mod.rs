//! Route definitions for the HTTP API.

pub mod auth;
pub mod health;
pub mod notes;

use axum::{Router, middleware};

use crate::middleware::{rate_limit, track_metrics};
use crate::state::AppState;

/// Build the complete router with all routes.
///
/// Auth and note routes are rate limited per client IP; operational routes
/// are not. Every matched route is timed.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::routes())
        .merge(notes::routes())
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(api)
        .merge(health::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .with_state(state)
}
