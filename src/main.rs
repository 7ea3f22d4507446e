use anyhow::Context;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod auth;
mod config;
mod db;
mod error;
mod models;
mod routes;
mod schema;
mod storage;

#[cfg(test)]
mod test_support;

use crate::config::Config;
use crate::storage::FileStore;

pub type ConnectionPool = deadpool_diesel::sqlite::Pool;
pub type DbConn = deadpool_diesel::sqlite::Connection;

#[derive(Clone)]
pub struct AppState {
  pub pool: ConnectionPool,
  pub store: FileStore,
}

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenv::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fototeca=info,tower_http=info")))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;

  let manager = deadpool_diesel::sqlite::Manager::new(config.database_url.clone(), deadpool_diesel::Runtime::Tokio1);
  let pool: ConnectionPool = deadpool_diesel::sqlite::Pool::builder(manager)
    .build()
    .context("Could not build the connection pool.")?;

  run_migrations(&pool).await.context("Failed to migrate.")?;
  info!("Migration successful.");

  let store = FileStore::open(config.storage_root.clone(), config.public_url.clone())?;

  let app = routes::router(AppState { pool, store });

  let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
  info!("Listening on {}", config.bind_addr);

  axum::serve(listener, app).await?;

  Ok(())
}

async fn run_migrations(pool: &ConnectionPool) -> anyhow::Result<()> {
  let conn = pool.get().await?;

  conn.interact(|c| {
    c.run_pending_migrations(MIGRATIONS)
      .map(|_| ())
      .map_err(|e| anyhow::anyhow!("{e}"))
  })
  .await
  .map_err(|e| anyhow::anyhow!("{e}"))?
}
