//! HTTP-level tests driving the full middleware stack with `oneshot`.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode, header},
    routing::get,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use notes_auth::AuthConfig;
use notes_core::{
    NewRefreshRecord, NewUser, Note, NoteId, RefreshRecord, RevocationReason, RoleSet, TokenId,
    User, UserId,
};
use notes_server::{
    ApiError, AppState, ServerConfig, build_app,
    middleware::{Metrics, expose_error_detail},
};
use notes_store::{Backend, CredentialStore, MemoryStore, NoteStore, StoreResult};
use serde_json::{Value, json};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    state: AppState,
    store: MemoryStore,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

fn auth_config() -> AuthConfig {
    let mut config = AuthConfig::new("api-test-access", "api-test-refresh");
    config.argon2_memory_kib = 1024;
    config.argon2_iterations = 1;
    config
}

fn spawn_app_with(config: ServerConfig) -> TestApp {
    let store = MemoryStore::new();
    let state = AppState::new(store.clone(), auth_config(), config, Metrics::new().unwrap()).unwrap();
    TestApp {
        app: build_app(state.clone()),
        state,
        store,
    }
}

fn spawn_app() -> TestApp {
    spawn_app_with(ServerConfig::default())
}

impl TestApp {
    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let mut request = builder.body(body).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 40000))));

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    async fn register(&self, username: &str, password: &str) -> TestResponse {
        self.post(
            "/auth/register",
            None,
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Log in and return (access, refresh).
    async fn login(&self, username: &str, password: &str) -> (String, String) {
        let response = self
            .post(
                "/auth/login",
                None,
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        (
            response.body["access_token"].as_str().unwrap().to_string(),
            response.body["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    async fn seed_admin(&self) -> String {
        self.state
            .sessions()
            .ensure_user("root", "rootpw", "admin".parse::<RoleSet>().unwrap())
            .await
            .unwrap();
        self.login("root", "rootpw").await.0
    }
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_register_login_refresh_replay() {
    let app = spawn_app();

    let response = app.register("admin", "admin123").await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body, json!({ "ok": true }));

    let login = app
        .post(
            "/auth/login",
            None,
            json!({ "username": "admin", "password": "admin123" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["token_type"], "Bearer");
    assert_eq!(login.body["roles"], json!(["user"]));
    let a1 = login.body["access_token"].as_str().unwrap().to_string();
    let r1 = login.body["refresh_token"].as_str().unwrap().to_string();

    let refreshed = app
        .post("/auth/refresh", None, json!({ "refresh_token": r1 }))
        .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert_eq!(refreshed.body["token_type"], "Bearer");
    let a2 = refreshed.body["access_token"].as_str().unwrap();
    let r2 = refreshed.body["refresh_token"].as_str().unwrap();
    assert_ne!(a1, a2);
    assert_ne!(r1, r2);

    let replay = app
        .post("/auth/refresh", None, json!({ "refresh_token": r1 }))
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.body["error"], "invalid_refresh");
}

#[tokio::test]
async fn test_register_errors() {
    let app = spawn_app();
    assert_eq!(app.register("dup", "pw").await.status, StatusCode::CREATED);

    let duplicate = app.register("dup", "other").await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.body["error"], "conflict");

    let missing = app.post("/auth/register", None, json!({ "username": "x" })).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["error"], "bad_request");

    let empty = app.register("", "pw").await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = spawn_app();
    app.register("alice", "right").await;

    let wrong = app
        .post("/auth/login", None, json!({ "username": "alice", "password": "wrong" }))
        .await;
    let unknown = app
        .post("/auth/login", None, json!({ "username": "nobody", "password": "right" }))
        .await;

    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["error"], "invalid_credentials");
    assert_eq!(wrong.body, unknown.body);

    let malformed = app
        .request(Method::POST, "/auth/login", None, Some(json!("not an object")))
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_me_returns_claims() {
    let app = spawn_app();
    app.register("bob", "pw").await;
    let user = app
        .store
        .find_user_by_username("bob")
        .await
        .unwrap()
        .unwrap();
    let (access, refresh) = app.login("bob", "pw").await;

    let me = app.get("/auth/me", Some(&access)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["sub"], json!(user.id));
    assert_eq!(me.body["roles"], json!(["user"]));
    assert!(me.body["exp"].as_i64().unwrap() > me.body["iat"].as_i64().unwrap());

    let anonymous = app.get("/auth/me", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["error"], "unauthorized");

    let with_refresh = app.get("/auth/me", Some(&refresh)).await;
    assert_eq!(with_refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let app = spawn_app();
    app.register("carol", "pw").await;
    let (_, refresh) = app.login("carol", "pw").await;

    let body = json!({ "refresh_token": refresh });
    let first = app.post("/auth/logout", None, body.clone()).await;
    assert_eq!(first.status, StatusCode::NO_CONTENT);

    let refreshed = app.post("/auth/refresh", None, body.clone()).await;
    assert_eq!(refreshed.status, StatusCode::UNAUTHORIZED);
    assert_eq!(refreshed.body["error"], "invalid_refresh");

    let second = app.post("/auth/logout", None, body).await;
    assert_eq!(second.status, StatusCode::NO_CONTENT);

    let garbage = app
        .post("/auth/logout", None, json!({ "refresh_token": "garbage" }))
        .await;
    assert_eq!(garbage.status, StatusCode::NO_CONTENT);

    let missing = app.post("/auth/logout", None, json!({})).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Notes
// ============================================================================

#[tokio::test]
async fn test_notes_crud_and_roles() {
    let app = spawn_app();
    app.register("writer", "pw").await;
    let (writer, _) = app.login("writer", "pw").await;
    let admin = app.seed_admin().await;

    let anonymous = app.post("/v1/notes", None, json!({ "msg": "hi" })).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let created = app.post("/v1/notes", Some(&writer), json!({ "msg": "  hello  " })).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["msg"], "hello");
    let id = created.body["id"].as_i64().unwrap();
    let uri = format!("/v1/notes/{id}");

    let fetched = app.get(&uri, None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["msg"], "hello");

    let updated = app
        .request(Method::PATCH, &uri, Some(&writer), Some(json!({ "msg": "edited" })))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["msg"], "edited");

    let forbidden = app.request(Method::DELETE, &uri, Some(&writer), None).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.body["error"], "forbidden");

    let deleted = app.request(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app.get(&uri, None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.body["error"], "not_found");

    let missing_update = app
        .request(Method::PATCH, &uri, Some(&writer), Some(json!({ "msg": "x" })))
        .await;
    assert_eq!(missing_update.status, StatusCode::NOT_FOUND);

    let missing_delete = app.request(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(missing_delete.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_note_validation() {
    let app = spawn_app();
    app.register("writer", "pw").await;
    let (writer, _) = app.login("writer", "pw").await;

    for bad in ["/v1/notes/abc", "/v1/notes/0", "/v1/notes/-5"] {
        let response = app.get(bad, None).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{bad}");
    }

    let empty = app.post("/v1/notes", Some(&writer), json!({ "msg": "   " })).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let long = app
        .post("/v1/notes", Some(&writer), json!({ "msg": "x".repeat(501) }))
        .await;
    assert_eq!(long.status, StatusCode::BAD_REQUEST);

    let no_msg = app.post("/v1/notes", Some(&writer), json!({})).await;
    assert_eq!(no_msg.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_without_writer_role_is_forbidden() {
    let app = spawn_app_with(ServerConfig {
        registration_roles: RoleSet::new(),
        ..ServerConfig::default()
    });
    app.register("reader", "pw").await;
    let (reader, _) = app.login("reader", "pw").await;

    let response = app.post("/v1/notes", Some(&reader), json!({ "msg": "hi" })).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cursor_pagination() {
    let app = spawn_app();
    app.register("writer", "pw").await;
    let (writer, _) = app.login("writer", "pw").await;

    let mut ids = Vec::new();
    for i in 0..5 {
        let created = app
            .post("/v1/notes", Some(&writer), json!({ "msg": format!("note {i}") }))
            .await;
        ids.push(created.body["id"].as_i64().unwrap());
    }
    ids.reverse();

    let first = app.get("/v1/notes?limit=2", None).await;
    assert_eq!(first.status, StatusCode::OK);
    let page: Vec<i64> = first.body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_i64().unwrap())
        .collect();
    assert_eq!(page, ids[..2]);
    assert_eq!(first.body["nextCursor"], json!(ids[1]));

    let second = app
        .get(&format!("/v1/notes?limit=2&cursor={}", ids[1]), None)
        .await;
    assert_eq!(second.body["items"][0]["id"], json!(ids[2]));
    assert_eq!(second.body["nextCursor"], json!(ids[3]));

    let last = app
        .get(&format!("/v1/notes?limit=2&cursor={}", ids[3]), None)
        .await;
    assert_eq!(last.body["items"].as_array().unwrap().len(), 1);
    assert_eq!(last.body["nextCursor"], Value::Null);

    let all = app.get("/v1/notes", None).await;
    assert_eq!(all.body["items"].as_array().unwrap().len(), 5);
    assert_eq!(all.body["nextCursor"], Value::Null);

    for bad in ["/v1/notes?limit=0", "/v1/notes?limit=101", "/v1/notes?cursor=x"] {
        assert_eq!(app.get(bad, None).await.status, StatusCode::BAD_REQUEST, "{bad}");
    }
}

// ============================================================================
// Middleware and operations
// ============================================================================

#[tokio::test]
async fn test_rate_limit() {
    let app = spawn_app_with(ServerConfig {
        rate_limit_max: 3,
        ..ServerConfig::default()
    });

    for _ in 0..3 {
        let response = app.get("/v1/notes", None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers["x-ratelimit-limit"], "3");
        let remaining: u32 = response.headers["x-ratelimit-remaining"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(remaining < 3);
    }

    let limited = app.get("/v1/notes", None).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["error"], "rate_limited");
    assert!(limited.headers.contains_key(header::RETRY_AFTER));

    // Operational routes are not limited.
    assert_eq!(app.get("/healthz", None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = spawn_app();
    let response = app.get("/healthz", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "ok": true }));
    assert_eq!(response.headers["x-content-type-options"], "nosniff");
    assert_eq!(response.headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(response.headers["referrer-policy"], "no-referrer");
    assert_eq!(response.headers["cross-origin-resource-policy"], "same-origin");
    assert!(!response.headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    assert!(response.headers.contains_key("x-request-id"));

    let hsts = spawn_app_with(ServerConfig {
        hsts: true,
        ..ServerConfig::default()
    });
    let response = hsts.get("/healthz", None).await;
    assert!(response.headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
}

#[tokio::test]
async fn test_readyz_follows_backend() {
    let app = spawn_app();

    let ready = app.get("/readyz", None).await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.body, json!({ "ready": true }));

    app.store.set_healthy(false);
    let not_ready = app.get("/readyz", None).await;
    assert_eq!(not_ready.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(not_ready.body, json!({ "ready": false }));
}

#[tokio::test]
async fn test_metrics_exposition() {
    let app = spawn_app();
    app.register("writer", "pw").await;
    let (writer, _) = app.login("writer", "pw").await;
    app.post("/v1/notes", Some(&writer), json!({ "msg": "counted" })).await;

    let response = app.get("/metrics", None).await;
    assert_eq!(response.status, StatusCode::OK);
    let text = response.body.as_str().unwrap();
    assert!(text.contains("notes_created_total 1"));
    assert!(text.contains(r#"auth_events_total{event="login",outcome="success"} 1"#));
    assert!(text.contains("http_request_duration_ms_bucket"));
    assert!(text.contains(r#"route="/v1/notes""#));
    assert!(text.contains("app_build_info"));
}

#[tokio::test]
async fn test_internal_detail_only_in_development() {
    let failing = || async { Err::<(), _>(ApiError::Internal("disk on fire".to_string())) };

    let production = Router::new().route("/boom", get(failing));
    let development = Router::new()
        .route("/boom", get(failing))
        .layer(axum::middleware::from_fn(expose_error_detail));

    for (router, expect_detail) in [(production, false), (development, true)] {
        let response = router
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "internal_error");
        assert_eq!(
            body["message"].as_str().unwrap().contains("disk on fire"),
            expect_detail
        );
    }
}

/// Delegates to a [`MemoryStore`] but stalls every note call.
struct StallingBackend {
    inner: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl CredentialStore for StallingBackend {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_username(username).await
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.inner.create_user(user).await
    }

    async fn save_refresh_record(&self, record: NewRefreshRecord) -> StoreResult<RefreshRecord> {
        self.inner.save_refresh_record(record).await
    }

    async fn find_refresh_record(&self, token_id: &TokenId) -> StoreResult<Option<RefreshRecord>> {
        self.inner.find_refresh_record(token_id).await
    }

    async fn consume_refresh_record(
        &self,
        token_id: &TokenId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshRecord>> {
        self.inner.consume_refresh_record(token_id, now).await
    }

    async fn revoke_refresh_record(&self, token_id: &TokenId, now: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.revoke_refresh_record(token_id, now).await
    }

    async fn is_refresh_valid(&self, token_id: &TokenId, now: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.is_refresh_valid(token_id, now).await
    }

    async fn list_active_refresh_records(&self, user_id: UserId) -> StoreResult<Vec<RefreshRecord>> {
        self.inner.list_active_refresh_records(user_id).await
    }

    async fn revoke_many(
        &self,
        ids: &[i64],
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.inner.revoke_many(ids, reason, now).await
    }
}

#[async_trait]
impl NoteStore for StallingBackend {
    async fn list_notes_page(&self, cursor: Option<NoteId>, limit: u32) -> StoreResult<Vec<Note>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_notes_page(cursor, limit).await
    }

    async fn get_note(&self, id: NoteId) -> StoreResult<Option<Note>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_note(id).await
    }

    async fn create_note(&self, msg: &str) -> StoreResult<Note> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_note(msg).await
    }

    async fn update_note(&self, id: NoteId, msg: &str) -> StoreResult<Option<Note>> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_note(id, msg).await
    }

    async fn delete_note(&self, id: NoteId) -> StoreResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_note(id).await
    }
}

#[async_trait]
impl Backend for StallingBackend {
    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

#[tokio::test]
async fn test_stalled_note_store_is_internal_error() {
    let store = MemoryStore::new();
    let backend = StallingBackend {
        inner: store.clone(),
        delay: Duration::from_secs(2),
    };
    let mut auth = auth_config();
    auth.store_timeout = Duration::from_millis(50);
    let state = AppState::new(backend, auth, ServerConfig::default(), Metrics::new().unwrap()).unwrap();
    let app = TestApp {
        app: build_app(state.clone()),
        state,
        store,
    };

    let response = app.get("/v1/notes", None).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "internal_error");

    let response = app.get("/v1/notes/1", None).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    // Credential calls are not stalled, so writes reach the note store.
    let admin = app.seed_admin().await;
    let response = app.post("/v1/notes", Some(&admin), json!({ "msg": "late" })).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "internal_error");
}
