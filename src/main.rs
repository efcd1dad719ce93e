//! Gotcha backend binary entrypoint wiring the REST surface to its storage
//! and face verification backends.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod dao;
mod dto;
mod error;
mod oracle;
mod routes;
mod services;
mod state;

#[cfg(not(feature = "postgres-store"))]
use dao::game_store::memory::MemoryStore;
#[cfg(feature = "postgres-store")]
use dao::game_store::postgres::{PgConfig, PgGameStore};

use config::AppConfig;
use dao::blob_store::{BlobStore, HttpBlobConfig, HttpBlobStore};
use dao::game_store::GameStore;
use oracle::{HttpFaceOracle, OracleConfig};
use services::storage_supervisor;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let port = config.port;

    let oracle_config = OracleConfig::from_env().context("reading oracle configuration")?;
    let oracle = HttpFaceOracle::new(oracle_config).context("building oracle client")?;

    let app_state = AppState::new(config, Arc::new(oracle));

    spawn_game_store_supervisor(app_state.clone())?;
    spawn_blob_store_supervisor(app_state.clone())?;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Launch the background task owning the PostgreSQL connection.
#[cfg(feature = "postgres-store")]
fn spawn_game_store_supervisor(state: SharedState) -> anyhow::Result<()> {
    let pg_config = PgConfig::from_env().context("reading database configuration")?;
    tokio::spawn(storage_supervisor::run_game_store(state, move || {
        let config = pg_config.clone();
        async move {
            let store = PgGameStore::connect(config).await?;
            Ok(Arc::new(store) as Arc<dyn GameStore>)
        }
    }));
    Ok(())
}

/// Without the PostgreSQL feature all game state lives in process memory.
#[cfg(not(feature = "postgres-store"))]
fn spawn_game_store_supervisor(state: SharedState) -> anyhow::Result<()> {
    tokio::spawn(storage_supervisor::run_game_store(state, || async {
        Ok(Arc::new(MemoryStore::new()) as Arc<dyn GameStore>)
    }));
    Ok(())
}

/// Launch the background task owning the photo store connection.
fn spawn_blob_store_supervisor(state: SharedState) -> anyhow::Result<()> {
    let blob_config = HttpBlobConfig::from_env().context("reading blob store configuration")?;
    tokio::spawn(storage_supervisor::run_blob_store(state, move || {
        let config = blob_config.clone();
        async move {
            let store = HttpBlobStore::connect(config).await?;
            Ok(Arc::new(store) as Arc<dyn BlobStore>)
        }
    }));
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
