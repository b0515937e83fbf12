use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod jwt;
mod middleware;
mod models;
mod routes;
mod state;

use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use domain::store::{MemoryStore, PgStore, Store};
use sqlx::PgPool;

use crate::{
    config::{ServerConfig, StorageKind},
    jwt::{JwtConfig, JwtService},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting API service");

    let config = ServerConfig::from_env()?;
    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    let (store, db_pool): (Arc<dyn Store>, Option<PgPool>) = match config.storage {
        StorageKind::Postgres => {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            run_migrations(&pool).await?;
            (Arc::new(PgStore::new(pool.clone())), Some(pool))
        }
        StorageKind::Memory => {
            warn!("Using in-memory storage, all data is lost on shutdown");
            (Arc::new(MemoryStore::new()), None)
        }
    };

    let state = AppState::new(store, db_pool, jwt_service, config.progress_policy);
    info!("Progress policy: {:?}", config.progress_policy);

    if let Some(seed) = config.admin_seed() {
        state
            .identity
            .bootstrap_admin(&seed.name, &seed.email, &seed.password)
            .await?;
    }

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("API service listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
