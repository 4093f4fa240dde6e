//! Entry point for the notes-server binary.

use std::net::SocketAddr;

use notes_auth::AuthConfig;
use notes_core::{ROLE_ADMIN, RoleSet};
use notes_server::{
    AppState, build_app,
    config::{LogFormat, ServerConfig},
    middleware::Metrics,
    spawn_background_tasks,
};
use notes_store::{Store, StoreConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = ServerConfig::from_env()?;
    let auth_config = AuthConfig::from_env()?;
    let store_config = StoreConfig::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting notes-server");
    tracing::info!(
        port = config.port,
        env = ?config.app_env,
        rate_limit_max = config.rate_limit_max,
        "Configuration loaded"
    );

    // Connect to database
    let store = Store::connect(store_config).await?;
    tracing::info!("Connected to database");

    // Build application state
    let admin = config.admin.clone();
    let state = AppState::new(store, auth_config, config.clone(), Metrics::new()?)?;

    if let Some(admin) = admin {
        let roles: RoleSet = [ROLE_ADMIN].into_iter().collect();
        let created = state
            .sessions()
            .ensure_user(&admin.username, &admin.password, roles)
            .await?;
        if created {
            tracing::info!(username = %admin.username, "Seeded admin user");
        }
    }

    let background = spawn_background_tasks(&state);
    let app = build_app(state);

    // Create listener
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    for task in background {
        task.abort();
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `LOG_LEVEL`.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
