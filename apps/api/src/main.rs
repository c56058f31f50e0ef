mod admin;
mod auth;
mod chat;
mod config;
mod db;
mod errors;
mod llm_client;
mod mailer;
mod models;
mod resume;
mod routes;
mod state;
mod storage;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StorageBackend};
use crate::db::create_pool;
use crate::llm_client::HttpCompletionClient;
use crate::mailer::Mailer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{MemStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (errors on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lumen API v{}", env!("CARGO_PKG_VERSION"));

    // Storage collaborator: chosen once, explicitly. A Postgres deployment
    // that cannot reach its database refuses to start rather than silently
    // degrading to a volatile store.
    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Postgres => {
            let database_url = config.database_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("DATABASE_URL is required for the postgres storage backend")
            })?;
            let pool = create_pool(database_url).await?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all data is lost on restart");
            Arc::new(MemStore::new())
        }
    };

    // Completion provider
    let llm = Arc::new(HttpCompletionClient::new(
        config.groq_api_key.clone(),
        config.openai_api_key.clone(),
    ));
    info!(
        "Completion client initialized (groq: {}, openai: {})",
        config.groq_api_key.is_some(),
        config.openai_api_key.is_some()
    );

    // Outbound mail
    let mailer = Arc::new(Mailer::from_config(&config));

    // Build app state
    let state = AppState {
        store,
        llm,
        mailer,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
