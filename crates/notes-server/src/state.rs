//! Application state shared across handlers.

use std::future::Future;
use std::sync::Arc;

use notes_auth::{AuthConfig, AuthResult, SessionManager};
use notes_store::{Backend, StoreResult};

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{ClientRateLimiter, Metrics};

/// Application state shared across all handlers.
///
/// This is cloneable and can be extracted in handlers using `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Users, refresh records and notes.
    backend: Arc<dyn Backend>,
    /// Token lifecycle on top of the same backend.
    sessions: Arc<SessionManager>,
    metrics: Arc<Metrics>,
    rate_limiter: Arc<ClientRateLimiter>,
    /// Server configuration.
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Create new application state.
    ///
    /// Fails if the auth configuration is unusable (empty or shared secrets,
    /// bad argon2 parameters).
    pub fn new<B>(backend: B, auth: AuthConfig, config: ServerConfig, metrics: Metrics) -> AuthResult<Self>
    where
        B: Backend + 'static,
    {
        let backend = Arc::new(backend);
        let sessions = SessionManager::new(backend.clone(), auth)?;
        let rate_limiter = ClientRateLimiter::new(config.rate_limit_max, config.rate_limit_window);

        Ok(Self {
            backend,
            sessions: Arc::new(sessions),
            metrics: Arc::new(metrics),
            rate_limiter: Arc::new(rate_limiter),
            config: Arc::new(config),
        })
    }

    /// Get a reference to the storage backend.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Await a backend call under the store timeout. Running out of time is
    /// an internal error.
    pub async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> ApiResult<T> {
        let timeout = self.sessions.config().store_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::error!(
                    operation,
                    timeout_ms = timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(ApiError::Internal(format!("{operation} timed out after {timeout:?}")))
            }
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn rate_limiter(&self) -> &ClientRateLimiter {
        &self.rate_limiter
    }

    /// Get a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
