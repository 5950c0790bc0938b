//! SneakerHub order service

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sneakerhub_orders::{
    events::EventPublisher,
    store::{MemoryStore, PgStore, Store},
    router, AppState, Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .context("connecting to DATABASE_URL")?;
            let store = PgStore::new(db);
            store.migrate().await.context("running migrations")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let events = EventPublisher::connect(config.nats_url.as_deref()).await;

    let app = router(AppState::new(store, events));
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("🚀 SneakerHub orders listening on {}", config.bind_addr());
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
