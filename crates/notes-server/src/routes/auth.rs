//! Authentication routes: register, login, refresh, logout, me.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use notes_auth::{AuthResult, TokenPair};
use notes_core::UserId;
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::error::ApiResult;
use crate::extract::JsonBody;
use crate::middleware::AuthEvent;
use crate::state::AppState;

/// Token type reported to clients.
pub const TOKEN_TYPE: &str = "Bearer";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub sub: UserId,
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Count the outcome and pass the result through.
fn counted<T>(state: &AppState, event: AuthEvent, result: AuthResult<T>) -> AuthResult<T> {
    state.metrics().auth_event(event, result.is_ok());
    result
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /auth/register
async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<OkResponse>)> {
    let roles = state.config().registration_roles.clone();
    let result = state
        .sessions()
        .register(&request.username, &request.password, roles)
        .await;
    counted(&state, AuthEvent::Register, result)?;

    Ok((StatusCode::CREATED, Json(OkResponse { ok: true })))
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CredentialsRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let result = state
        .sessions()
        .login(&request.username, &request.password)
        .await;
    let TokenPair {
        access_token,
        refresh_token,
        roles,
    } = counted(&state, AuthEvent::Login, result)?;

    Ok(Json(LoginResponse {
        token_type: TOKEN_TYPE.to_string(),
        access_token,
        refresh_token,
        roles: roles.to_vec(),
    }))
}

/// POST /auth/refresh - rotate a refresh token.
async fn refresh(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let result = state.sessions().refresh(&request.refresh_token).await;
    let pair = counted(&state, AuthEvent::Refresh, result)?;

    Ok(Json(RefreshResponse {
        token_type: TOKEN_TYPE.to_string(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// POST /auth/logout - revoke a refresh token. Always 204 unless the store fails.
async fn logout(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> ApiResult<StatusCode> {
    let result = state.sessions().logout(&request.refresh_token).await;
    counted(&state, AuthEvent::Logout, result)?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me - claims of the presented access token.
async fn me(user: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse {
        sub: user.user_id,
        roles: user.roles.to_vec(),
        iat: user.claims.iat,
        exp: user.claims.exp,
    })
}

/// Build authentication routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}
