//! Assignment Service
//!
//! Entry point. Loads configuration, connects the document store, and serves
//! the HTTP API until SIGINT or SIGTERM.

use assignment_service::config::{Config, StoreBackend};
use assignment_service::observability::metrics::init_metrics_recorder;
use assignment_service::routes::{self, AppState};
use assignment_service::store::{DocumentStore, MemoryDocumentStore, PgDocumentStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assignment_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Assignment Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        store_backend = ?config.store_backend,
        collection = %config.assignment_collection,
        id_allocator = %config.id_allocator,
        access_token_expire_minutes = config.access_token_expire_minutes,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let store = connect_store(&config).await?;

    // Hashes configured passwords, which takes a moment at production cost.
    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(config, store).map_err(|e| {
        error!("Failed to build application state: {}", e);
        e
    })?);

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Assignment Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Assignment Service shutdown complete");

    Ok(())
}

/// Open the configured document store.
async fn connect_store(
    config: &Config,
) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
    match config.store_backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store; assignments are lost on restart");
            Ok(Arc::new(MemoryDocumentStore::new(
                config.assignment_collection.clone(),
            )))
        }
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or("DATABASE_URL is required for the postgres store backend")?;

            info!("Connecting to database...");
            let db_url_with_timeout = add_query_timeout(database_url, 5);
            let db_pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(20)
                .min_connections(2)
                .acquire_timeout(Duration::from_secs(5))
                .idle_timeout(Duration::from_secs(600))
                .max_lifetime(Duration::from_secs(1800))
                .connect(&db_url_with_timeout)
                .await
                .map_err(|e| {
                    error!("Failed to connect to database: {}", e);
                    e
                })?;

            sqlx::migrate!("../../migrations")
                .run(&db_pool)
                .await
                .map_err(|e| {
                    error!("Failed to run database migrations: {}", e);
                    e
                })?;

            info!("Database connection established");

            Ok(Arc::new(PgDocumentStore::new(
                db_pool,
                config.assignment_collection.clone(),
            )))
        }
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Adds statement_timeout to the database URL.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_query_timeout() {
        assert_eq!(
            add_query_timeout("postgresql://localhost/assignments", 5),
            "postgresql://localhost/assignments?options=-c%20statement_timeout%3D5s"
        );
        assert_eq!(
            add_query_timeout("postgresql://localhost/assignments?sslmode=disable", 3),
            "postgresql://localhost/assignments?sslmode=disable&options=-c%20statement_timeout%3D3s"
        );
    }
}
