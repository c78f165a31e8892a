use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use admix_core::store::KvStore;
use admix_db::{MemoryStore, PgKvStore};
use admix_events::{EventBus, EventLogger};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use admix_api::config::{ConfigError, ServerConfig, StoreBackend};
use admix_api::router::build_app_router;
use admix_api::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admix_api=debug,admix_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(
        host = %config.host,
        port = %config.port,
        backend = ?config.store_backend,
        "Loaded server configuration"
    );

    // --- Store ---
    let store = connect_store(&config).await?;

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let logger_handle = tokio::spawn(EventLogger::run(event_bus.subscribe()));

    // --- App state and router ---
    let state = AppState::new(store, config.clone(), Arc::clone(&event_bus));
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host: IpAddr = config.host.parse().map_err(|_| ConfigError::Invalid {
        var: "HOST",
        value: config.host.clone(),
    })?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    // The router (and its state) is gone; dropping the last bus handle
    // closes the channel and stops the logger.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Open the configured record store.
async fn connect_store(config: &ServerConfig) -> Result<Arc<dyn KvStore>, Box<dyn std::error::Error>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;

            let pool = admix_db::create_pool(database_url).await?;
            tracing::info!("Database connection pool created");

            admix_db::health_check(&pool).await?;
            tracing::info!("Database health check passed");

            admix_db::run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");

            Ok(Arc::new(PgKvStore::new(pool)))
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
