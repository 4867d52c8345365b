use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use depot_api::{app, AppState};
use depot_core::{InMemoryStore, LogisticsEngine, LogisticsStore};
use depot_store::{app_config::Config, DbClient, PgLogisticsStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "depot_api=debug,depot_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Depot API on port {}", config.server.port);

    let store: Arc<dyn LogisticsStore> = match &config.database {
        Some(database) => {
            let db = DbClient::new(database)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PgLogisticsStore::new(db.pool.clone()))
        }
        None => {
            tracing::warn!("No database configured, using the in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let app_state = AppState {
        engine: LogisticsEngine::new(store),
        business_rules: config.business_rules.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
